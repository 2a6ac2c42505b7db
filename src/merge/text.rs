//! Line-based three-way merge.
//!
//! Each side is diffed against the base with Myers' algorithm. Changes
//! touching disjoint base regions are combined; overlapping or adjacent
//! changes conflict unless both sides made the identical edit.

/// A changed region: base lines `base_start..base_end` were replaced by side
/// lines `side_start..side_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hunk {
    base_start: usize,
    base_end: usize,
    side_start: usize,
    side_end: usize,
}

/// Split into lines, each keeping its trailing `\n`.
pub(crate) fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in data.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Myers shortest edit script between `a` and `b`, as change hunks.
fn diff(a: &[&[u8]], b: &[&[u8]]) -> Vec<Hunk> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let matches = myers_matches(a_mid, b_mid);

    let mut hunks = Vec::new();
    let (mut pa, mut pb) = (0, 0);
    for (x, y) in matches.into_iter().chain(std::iter::once((a_mid.len(), b_mid.len()))) {
        if x > pa || y > pb {
            hunks.push(Hunk {
                base_start: prefix + pa,
                base_end: prefix + x,
                side_start: prefix + pb,
                side_end: prefix + y,
            });
        }
        pa = x + 1;
        pb = y + 1;
    }
    hunks
}

/// Index pairs of matching lines along a shortest edit path, ascending.
fn myers_matches(a: &[&[u8]], b: &[&[u8]]) -> Vec<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = (n + m) as usize;
    if max == 0 {
        return Vec::new();
    }

    let offset = max as isize + 1;
    let mut v = vec![0isize; 2 * max + 3];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max as isize {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    let mut matches = Vec::new();
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[(k - 1 + offset) as usize] < v[(k + 1 + offset) as usize]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            matches.push((x as usize, y as usize));
        }
        x = prev_x;
        y = prev_y;
    }
    matches.reverse();
    matches
}

/// One region of a merge result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Chunk<'a> {
    Clean(Vec<&'a [u8]>),
    Conflict {
        ours: Vec<&'a [u8]>,
        theirs: Vec<&'a [u8]>,
    },
}

/// Result of merging three versions of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextMerge<'a> {
    pub(crate) chunks: Vec<Chunk<'a>>,
}

impl<'a> TextMerge<'a> {
    pub(crate) fn is_clean(&self) -> bool {
        self.chunks.iter().all(|c| matches!(c, Chunk::Clean(_)))
    }

    /// Merged content, with conflict regions rendered as markers.
    pub(crate) fn render(&self, ours_label: &str, theirs_label: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Clean(lines) => lines.iter().for_each(|l| out.extend_from_slice(l)),
                Chunk::Conflict { ours, theirs } => {
                    out.extend_from_slice(format!("<<<<<<< {}\n", ours_label).as_bytes());
                    push_lines(&mut out, ours);
                    out.extend_from_slice(b"=======\n");
                    push_lines(&mut out, theirs);
                    out.extend_from_slice(format!(">>>>>>> {}\n", theirs_label).as_bytes());
                }
            }
        }
        out
    }
}

fn push_lines(out: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        out.extend_from_slice(line);
    }
    if !out.is_empty() && out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
}

/// Three-way merge of `ours` and `theirs` against `base`.
pub(crate) fn merge<'a>(base: &'a [u8], ours: &'a [u8], theirs: &'a [u8]) -> TextMerge<'a> {
    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);
    let ours_hunks = diff(&base_lines, &ours_lines);
    let theirs_hunks = diff(&base_lines, &theirs_lines);

    let mut chunks = Vec::new();
    let mut clean: Vec<&[u8]> = Vec::new();
    let mut pos = 0;
    let (mut i, mut j) = (0, 0);

    while i < ours_hunks.len() || j < theirs_hunks.len() {
        let take_ours = match (ours_hunks.get(i), theirs_hunks.get(j)) {
            (Some(o), Some(t)) => o.base_start <= t.base_start,
            (Some(_), None) => true,
            _ => false,
        };
        let first = if take_ours { ours_hunks[i] } else { theirs_hunks[j] };
        let start = first.base_start;
        let mut end = first.base_end;
        let (oi, ti) = (i, j);
        if take_ours {
            i += 1;
        } else {
            j += 1;
        }

        // Absorb every hunk from either side that overlaps or touches the group.
        loop {
            if let Some(o) = ours_hunks.get(i).filter(|h| h.base_start <= end) {
                end = end.max(o.base_end);
                i += 1;
            } else if let Some(t) = theirs_hunks.get(j).filter(|h| h.base_start <= end) {
                end = end.max(t.base_end);
                j += 1;
            } else {
                break;
            }
        }

        clean.extend_from_slice(&base_lines[pos..start]);
        let ours_side = side_range(&ours_hunks[oi..i], start, end, &ours_lines);
        let theirs_side = side_range(&theirs_hunks[ti..j], start, end, &theirs_lines);
        match (ours_side, theirs_side) {
            (Some(o), None) => clean.extend_from_slice(o),
            (None, Some(t)) => clean.extend_from_slice(t),
            (Some(o), Some(t)) if o == t => clean.extend_from_slice(o),
            (o, t) => {
                if !clean.is_empty() {
                    chunks.push(Chunk::Clean(std::mem::take(&mut clean)));
                }
                let base_region = &base_lines[start..end];
                chunks.push(Chunk::Conflict {
                    ours: o.unwrap_or(base_region).to_vec(),
                    theirs: t.unwrap_or(base_region).to_vec(),
                });
            }
        }
        pos = end;
    }

    clean.extend_from_slice(&base_lines[pos..]);
    if !clean.is_empty() {
        chunks.push(Chunk::Clean(clean));
    }
    TextMerge { chunks }
}

/// The side's replacement for base region `start..end`, or `None` if the
/// side did not touch it.
fn side_range<'l, 'a>(
    hunks: &[Hunk],
    start: usize,
    end: usize,
    lines: &'l [&'a [u8]],
) -> Option<&'l [&'a [u8]]> {
    let first = hunks.first()?;
    let last = hunks.last()?;
    let side_start = first.side_start - (first.base_start - start);
    let side_end = last.side_end + (end - last.base_end);
    Some(&lines[side_start..side_end])
}
