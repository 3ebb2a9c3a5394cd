// Diff and patch engines.
//
// `compute_diff` implements the classic bsdiff matcher: a suffix array over
// the source, binary-search longest-match against it, then forward/backward
// extension of each match under the 50%-mismatch heuristic and splitting of
// overlapping extensions. Output is the (control, diff, extra) triple the
// container serializes.
//
// `apply_patch` is bspatch: replay the control tuples in order, adding diff
// bytes to source bytes (wrapping, byte-wise) and inserting extra bytes
// literally. Semantics match bsdiff4's core, with the difference that every
// tuple is bounds-checked against the destination and both byte streams
// instead of trusting the patch.
//
// The suffix array uses prefix-doubling (O(n log^2 n)) rather than
// bsdiff's qsufsort; the produced order is the same, so patches are
// interchangeable.

use crate::format::Control;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for patch application. A corrupt control sequence (or a patch
/// applied against the wrong source length) aborts reconstruction; there is
/// no partial output.
#[derive(Debug)]
pub enum ApplyError {
    Corrupt(String),
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corrupt(msg) => write!(f, "corrupt patch: {msg}"),
        }
    }
}

impl std::error::Error for ApplyError {}

fn corrupt(msg: &str) -> ApplyError {
    ApplyError::Corrupt(msg.to_string())
}

// ---------------------------------------------------------------------------
// Suffix array
// ---------------------------------------------------------------------------

/// Sorted suffix start positions of `data`, by prefix-doubling.
fn suffix_array(data: &[u8]) -> Vec<usize> {
    let n = data.len();
    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i64> = data.iter().map(|&b| i64::from(b)).collect();
    let mut next_rank: Vec<i64> = vec![0; n];
    let mut k = 1usize;

    loop {
        // Sort by (rank of suffix, rank of suffix k bytes later); rank -1
        // places suffixes shorter than k below all others, like a sentinel.
        let key = |i: usize| -> (i64, i64) {
            let second = if i + k < n { rank[i + k] } else { -1 };
            (rank[i], second)
        };
        sa.sort_unstable_by_key(|&i| key(i));

        next_rank[sa[0]] = 0;
        for w in 1..n {
            next_rank[sa[w]] = next_rank[sa[w - 1]] + i64::from(key(sa[w]) != key(sa[w - 1]));
        }
        std::mem::swap(&mut rank, &mut next_rank);

        if rank[sa[n - 1]] == (n - 1) as i64 {
            break; // all ranks distinct: fully sorted
        }
        k *= 2;
    }
    sa
}

/// Length of the common prefix of `a` and `b`.
fn matchlen(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Longest match of `target` against any suffix of `old`.
/// Returns `(match_len, position_in_old)`.
fn search(sa: &[usize], old: &[u8], target: &[u8]) -> (usize, usize) {
    let mut st = 0usize;
    let mut en = sa.len() - 1;

    // Narrow to the lexicographic insertion point; the longest match sits
    // next to it on one side or the other.
    while en - st >= 2 {
        let mid = st + (en - st) / 2;
        let suffix = &old[sa[mid]..];
        let n = suffix.len().min(target.len());
        if suffix[..n] < target[..n] {
            st = mid;
        } else {
            en = mid;
        }
    }

    let len_st = matchlen(&old[sa[st]..], target);
    let len_en = matchlen(&old[sa[en]..], target);
    if len_st > len_en {
        (len_st, sa[st])
    } else {
        (len_en, sa[en])
    }
}

// ---------------------------------------------------------------------------
// Diff engine
// ---------------------------------------------------------------------------

/// Compute the `(control, diff, extra)` triple transforming `src` into
/// `dst`.
///
/// The destination length is not part of the result; callers pass
/// `dst.len()` to the container writer. Always succeeds: any pair of
/// buffers has a (possibly match-free) diff.
pub fn compute_diff(src: &[u8], dst: &[u8]) -> (Vec<Control>, Vec<u8>, Vec<u8>) {
    if dst.is_empty() {
        return (Vec::new(), Vec::new(), Vec::new());
    }
    if src.is_empty() {
        // No suffixes to match: the whole destination is one literal run.
        let control = vec![Control {
            copy_len: 0,
            extra_len: dst.len() as i64,
            seek: 0,
        }];
        return (control, Vec::new(), dst.to_vec());
    }

    let sa = suffix_array(src);
    let oldsize = src.len() as i64;
    let newsize = dst.len() as i64;

    let mut control = Vec::new();
    let mut diff: Vec<u8> = Vec::new();
    let mut extra: Vec<u8> = Vec::new();

    let mut scan: i64 = 0;
    let mut len: i64 = 0;
    let mut pos: i64 = 0;
    let mut lastscan: i64 = 0;
    let mut lastpos: i64 = 0;
    let mut lastoffset: i64 = 0;

    while scan < newsize {
        let mut oldscore: i64 = 0;
        scan += len;
        let mut scsc = scan;

        // Advance until the best suffix match beats continuing the previous
        // alignment by more than 8 bytes (or agrees with it exactly).
        while scan < newsize {
            let (l, p) = search(&sa, src, &dst[scan as usize..]);
            len = l as i64;
            pos = p as i64;

            while scsc < scan + len {
                let idx = scsc + lastoffset;
                if idx >= 0 && idx < oldsize && src[idx as usize] == dst[scsc as usize] {
                    oldscore += 1;
                }
                scsc += 1;
            }

            if (len == oldscore && len != 0) || len > oldscore + 8 {
                break;
            }

            let idx = scan + lastoffset;
            if idx >= 0 && idx < oldsize && src[idx as usize] == dst[scan as usize] {
                oldscore -= 1;
            }
            scan += 1;
        }

        if len != oldscore || scan == newsize {
            // Extend the previous match forward while at least half the
            // bytes agree.
            let mut s: i64 = 0;
            let mut best: i64 = 0;
            let mut lenf: i64 = 0;
            let mut i: i64 = 0;
            while lastscan + i < scan && lastpos + i < oldsize {
                if src[(lastpos + i) as usize] == dst[(lastscan + i) as usize] {
                    s += 1;
                }
                i += 1;
                if s * 2 - i > best * 2 - lenf {
                    best = s;
                    lenf = i;
                }
            }

            // Extend the new match backward the same way.
            let mut lenb: i64 = 0;
            if scan < newsize {
                let mut s: i64 = 0;
                let mut best: i64 = 0;
                let mut i: i64 = 1;
                while scan >= lastscan + i && pos >= i {
                    if src[(pos - i) as usize] == dst[(scan - i) as usize] {
                        s += 1;
                    }
                    if s * 2 - i > best * 2 - lenb {
                        best = s;
                        lenb = i;
                    }
                    i += 1;
                }
            }

            // The extensions may overlap; split at the point that leaves
            // the most agreeing bytes on each side.
            if lastscan + lenf > scan - lenb {
                let overlap = (lastscan + lenf) - (scan - lenb);
                let mut s: i64 = 0;
                let mut best: i64 = 0;
                let mut lens: i64 = 0;
                for i in 0..overlap {
                    if dst[(lastscan + lenf - overlap + i) as usize]
                        == src[(lastpos + lenf - overlap + i) as usize]
                    {
                        s += 1;
                    }
                    if dst[(scan - lenb + i) as usize] == src[(pos - lenb + i) as usize] {
                        s -= 1;
                    }
                    if s > best {
                        best = s;
                        lens = i + 1;
                    }
                }
                lenf += lens - overlap;
                lenb -= lens;
            }

            for i in 0..lenf {
                diff.push(dst[(lastscan + i) as usize].wrapping_sub(src[(lastpos + i) as usize]));
            }
            let extra_len = (scan - lenb) - (lastscan + lenf);
            for i in 0..extra_len {
                extra.push(dst[(lastscan + lenf + i) as usize]);
            }

            control.push(Control {
                copy_len: lenf,
                extra_len,
                seek: (pos - lenb) - (lastpos + lenf),
            });

            lastscan = scan - lenb;
            lastpos = pos - lenb;
            lastoffset = pos - scan;
        }
    }

    (control, diff, extra)
}

// ---------------------------------------------------------------------------
// Patch engine
// ---------------------------------------------------------------------------

/// Reconstruct the destination from `src` and a decoded patch.
///
/// Source reads outside `src` contribute zero bytes (bspatch semantics);
/// the source cursor itself may range freely via negative seeks. There is
/// no check that `src` is the buffer originally diffed — a mismatched
/// source yields garbage output or a `Corrupt` error, never a detected
/// mismatch.
pub fn apply_patch(
    src: &[u8],
    dst_len: usize,
    control: &[Control],
    diff: &[u8],
    extra: &[u8],
) -> Result<Vec<u8>, ApplyError> {
    let mut dst = vec![0u8; dst_len];
    let mut newpos: usize = 0;
    let mut oldpos: i64 = 0;
    let mut diffpos: usize = 0;
    let mut extrapos: usize = 0;

    for c in control {
        let copy_len = usize::try_from(c.copy_len)
            .map_err(|_| corrupt("negative copy length in control tuple"))?;
        let extra_len = usize::try_from(c.extra_len)
            .map_err(|_| corrupt("negative extra length in control tuple"))?;

        let copy_end = newpos
            .checked_add(copy_len)
            .filter(|&end| end <= dst_len)
            .ok_or_else(|| corrupt("copy run exceeds destination length"))?;
        let diff_end = diffpos
            .checked_add(copy_len)
            .filter(|&end| end <= diff.len())
            .ok_or_else(|| corrupt("copy run exceeds diff block"))?;

        for i in 0..copy_len {
            let old_idx = oldpos + i as i64;
            let old_byte = if old_idx >= 0 && (old_idx as u64) < src.len() as u64 {
                src[old_idx as usize]
            } else {
                0
            };
            dst[newpos + i] = diff[diffpos + i].wrapping_add(old_byte);
        }
        newpos = copy_end;
        diffpos = diff_end;
        oldpos = oldpos
            .checked_add(c.copy_len)
            .ok_or_else(|| corrupt("source cursor overflow"))?;

        let extra_end = newpos
            .checked_add(extra_len)
            .filter(|&end| end <= dst_len)
            .ok_or_else(|| corrupt("extra run exceeds destination length"))?;
        let extra_src_end = extrapos
            .checked_add(extra_len)
            .filter(|&end| end <= extra.len())
            .ok_or_else(|| corrupt("extra run exceeds extra block"))?;

        dst[newpos..extra_end].copy_from_slice(&extra[extrapos..extra_src_end]);
        newpos = extra_end;
        extrapos = extra_src_end;

        oldpos = oldpos
            .checked_add(c.seek)
            .ok_or_else(|| corrupt("source cursor overflow"))?;
    }

    if newpos != dst_len {
        return Err(corrupt("control sequence does not cover the destination"));
    }
    Ok(dst)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &[u8], dst: &[u8]) {
        let (control, diff, extra) = compute_diff(src, dst);
        let rebuilt = apply_patch(src, dst.len(), &control, &diff, &extra).unwrap();
        assert_eq!(rebuilt, dst);
    }

    /// Deterministic pseudo-random bytes (xorshift).
    fn noise(seed: u64, len: usize) -> Vec<u8> {
        let mut state = seed.max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn suffix_array_is_sorted() {
        let cases: [&[u8]; 4] = [b"banana", b"aaaaaaaa", b"x", &noise(7, 300)];
        for data in cases {
            let sa = suffix_array(data);
            assert_eq!(sa.len(), data.len());
            for pair in sa.windows(2) {
                assert!(
                    data[pair[0]..] < data[pair[1]..],
                    "suffixes out of order for {data:?}"
                );
            }
        }
    }

    #[test]
    fn matchlen_basics() {
        assert_eq!(matchlen(b"abcdef", b"abcxyz"), 3);
        assert_eq!(matchlen(b"", b"abc"), 0);
        assert_eq!(matchlen(b"abc", b"abc"), 3);
        assert_eq!(matchlen(b"abc", b"abcdef"), 3);
    }

    #[test]
    fn search_finds_longest_match() {
        let old = b"the quick brown fox jumps over the lazy dog";
        let sa = suffix_array(old);
        let (len, pos) = search(&sa, old, b"brown fox leaps");
        assert_eq!(len, 10);
        assert_eq!(&old[pos..pos + len], b"brown fox ");
    }

    #[test]
    fn roundtrip_identical_buffers() {
        let data = b"identical content on both sides";
        roundtrip(data, data);
    }

    #[test]
    fn roundtrip_empty_source() {
        roundtrip(b"", b"hello");
    }

    #[test]
    fn roundtrip_empty_destination() {
        roundtrip(b"anything at all", b"");
    }

    #[test]
    fn roundtrip_both_empty() {
        roundtrip(b"", b"");
    }

    #[test]
    fn roundtrip_small_edit() {
        let src = b"The quick brown fox jumps over the lazy dog. 1234567890";
        let dst = b"The quick brown cat sits on the lazy mat. 1234567890!!!";
        roundtrip(src, dst);
    }

    #[test]
    fn roundtrip_insertion_at_front() {
        let src = noise(11, 2000);
        let mut dst = b"inserted prefix".to_vec();
        dst.extend_from_slice(&src);
        roundtrip(&src, &dst);
    }

    #[test]
    fn roundtrip_scattered_mutations() {
        let src = noise(42, 8192);
        let mut dst = src.clone();
        for i in (0..dst.len()).step_by(257) {
            dst[i] = dst[i].wrapping_add(1);
        }
        roundtrip(&src, &dst);
    }

    #[test]
    fn roundtrip_unrelated_buffers() {
        roundtrip(&noise(1, 1500), &noise(2, 1700));
    }

    #[test]
    fn roundtrip_repetitive_data() {
        let src: Vec<u8> = b"ab".iter().copied().cycle().take(4096).collect();
        let mut dst = src.clone();
        dst.truncate(3000);
        dst.extend_from_slice(b"tail");
        roundtrip(&src, &dst);
    }

    #[test]
    fn diff_of_identical_is_one_copy_run() {
        let data = noise(5, 1024);
        let (control, diff, extra) = compute_diff(&data, &data);
        assert_eq!(control.len(), 1);
        assert_eq!(control[0].copy_len, data.len() as i64);
        assert_eq!(control[0].extra_len, 0);
        assert!(extra.is_empty());
        assert!(diff.iter().all(|&b| b == 0));
    }

    #[test]
    fn apply_rejects_copy_past_destination() {
        let control = [Control {
            copy_len: 10,
            extra_len: 0,
            seek: 0,
        }];
        let err = apply_patch(b"0123456789", 5, &control, &[0u8; 10], b"").unwrap_err();
        assert!(matches!(err, ApplyError::Corrupt(_)));
    }

    #[test]
    fn apply_rejects_exhausted_diff_block() {
        let control = [Control {
            copy_len: 4,
            extra_len: 0,
            seek: 0,
        }];
        let err = apply_patch(b"abcd", 4, &control, &[0u8; 2], b"").unwrap_err();
        assert!(matches!(err, ApplyError::Corrupt(_)));
    }

    #[test]
    fn apply_rejects_exhausted_extra_block() {
        let control = [Control {
            copy_len: 0,
            extra_len: 4,
            seek: 0,
        }];
        let err = apply_patch(b"", 4, &control, &[], b"ab").unwrap_err();
        assert!(matches!(err, ApplyError::Corrupt(_)));
    }

    #[test]
    fn apply_rejects_short_coverage() {
        let control = [Control {
            copy_len: 2,
            extra_len: 0,
            seek: 0,
        }];
        let err = apply_patch(b"ab", 5, &control, &[0u8; 2], b"").unwrap_err();
        assert!(matches!(err, ApplyError::Corrupt(_)));
    }

    #[test]
    fn apply_rejects_negative_copy_len() {
        let control = [Control {
            copy_len: -1,
            extra_len: 0,
            seek: 0,
        }];
        let err = apply_patch(b"", 0, &control, &[], b"").unwrap_err();
        assert!(matches!(err, ApplyError::Corrupt(_)));
    }

    #[test]
    fn out_of_range_source_reads_contribute_zero() {
        // Copy 4 bytes against a 2-byte source: the tail adds zeros, so the
        // diff bytes pass through unchanged there.
        let control = [Control {
            copy_len: 4,
            extra_len: 0,
            seek: 0,
        }];
        let out = apply_patch(b"\x01\x01", 4, &control, &[0x10, 0x10, 0x10, 0x10], b"").unwrap();
        assert_eq!(out, [0x11, 0x11, 0x10, 0x10]);
    }

    #[test]
    fn negative_seek_rewinds_source() {
        // Two copy runs over the same source window.
        let control = [
            Control {
                copy_len: 3,
                extra_len: 0,
                seek: -3,
            },
            Control {
                copy_len: 3,
                extra_len: 0,
                seek: 0,
            },
        ];
        let out = apply_patch(b"abc", 6, &control, &[0u8; 6], b"").unwrap();
        assert_eq!(out, b"abcabc");
    }
}
