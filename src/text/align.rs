//! Token-level alignment between two transcripts.
//!
//! [`diff_words`] computes a longest-common-subsequence alignment over the
//! word streams of two texts and folds the result into an alternating list
//! of [`DiffSegment`]s: matching runs are anchors, everything between two
//! anchors that differs on either side becomes one divergent region.
//!
//! The reconciler turns divergent regions into provider-attributed markers;
//! nothing in this module knows about providers or markers.

// ---------------------------------------------------------------------------
// DiffSegment
// ---------------------------------------------------------------------------

/// One aligned region of two token streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSegment {
    /// Both sides agree on this run of words.
    Common(String),
    /// The sides differ. Either string may be empty (pure insertion or
    /// deletion on one side).
    Divergent { left: String, right: String },
}

impl DiffSegment {
    /// Returns `true` for [`DiffSegment::Divergent`].
    pub fn is_divergent(&self) -> bool {
        matches!(self, DiffSegment::Divergent { .. })
    }
}

// ---------------------------------------------------------------------------
// diff_words
// ---------------------------------------------------------------------------

/// Align two texts word-by-word and return the merged segment list.
///
/// Identical inputs produce a single [`DiffSegment::Common`]; two texts with
/// no words in common produce a single [`DiffSegment::Divergent`].
///
/// ```
/// use dictation_pipeline::text::{diff_words, DiffSegment};
///
/// let segs = diff_words("heart rate 80", "heart rate 90");
/// assert_eq!(segs[0], DiffSegment::Common("heart rate".into()));
/// assert!(segs[1].is_divergent());
/// ```
pub fn diff_words(left: &str, right: &str) -> Vec<DiffSegment> {
    let a: Vec<&str> = left.split_whitespace().collect();
    let b: Vec<&str> = right.split_whitespace().collect();

    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }

    // Trim the common prefix and suffix before running the quadratic DP —
    // transcripts of the same recording agree on most of their length.
    let mut prefix = 0;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < a.len() - prefix && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let mut ops: Vec<Op> = Vec::with_capacity(a.len() + b.len());
    ops.extend(a[..prefix].iter().copied().map(Op::Both));
    lcs_ops(mid_a, mid_b, &mut ops);
    ops.extend(a[a.len() - suffix..].iter().copied().map(Op::Both));

    coalesce(&ops)
}

/// Per-word alignment op.
enum Op<'a> {
    Both(&'a str),
    Left(&'a str),
    Right(&'a str),
}

/// Standard LCS dynamic program over the (already trimmed) middle sections.
fn lcs_ops<'a>(a: &[&'a str], b: &[&'a str], ops: &mut Vec<Op<'a>>) {
    let n = a.len();
    let m = b.len();
    if n == 0 && m == 0 {
        return;
    }

    // dp[i][j] = LCS length of a[i..] and b[j..], flattened row-major.
    let w = m + 1;
    let mut dp = vec![0u32; (n + 1) * w];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i * w + j] = if a[i] == b[j] {
                dp[(i + 1) * w + j + 1] + 1
            } else {
                dp[(i + 1) * w + j].max(dp[i * w + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Both(a[i]));
            i += 1;
            j += 1;
        } else if dp[(i + 1) * w + j] >= dp[i * w + j + 1] {
            ops.push(Op::Left(a[i]));
            i += 1;
        } else {
            ops.push(Op::Right(b[j]));
            j += 1;
        }
    }
    ops.extend(a[i..].iter().copied().map(Op::Left));
    ops.extend(b[j..].iter().copied().map(Op::Right));
}

/// Fold the per-word op stream into alternating common/divergent segments.
fn coalesce(ops: &[Op<'_>]) -> Vec<DiffSegment> {
    let mut segments = Vec::new();
    let mut common: Vec<&str> = Vec::new();
    let mut left: Vec<&str> = Vec::new();
    let mut right: Vec<&str> = Vec::new();

    let flush_divergent =
        |segments: &mut Vec<DiffSegment>, left: &mut Vec<&str>, right: &mut Vec<&str>| {
            if !left.is_empty() || !right.is_empty() {
                segments.push(DiffSegment::Divergent {
                    left: left.join(" "),
                    right: right.join(" "),
                });
                left.clear();
                right.clear();
            }
        };
    let flush_common = |segments: &mut Vec<DiffSegment>, common: &mut Vec<&str>| {
        if !common.is_empty() {
            segments.push(DiffSegment::Common(common.join(" ")));
            common.clear();
        }
    };

    for op in ops {
        match op {
            Op::Both(word) => {
                flush_divergent(&mut segments, &mut left, &mut right);
                common.push(word);
            }
            Op::Left(word) => {
                flush_common(&mut segments, &mut common);
                left.push(word);
            }
            Op::Right(word) => {
                flush_common(&mut segments, &mut common);
                right.push(word);
            }
        }
    }
    flush_divergent(&mut segments, &mut left, &mut right);
    flush_common(&mut segments, &mut common);

    segments
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
