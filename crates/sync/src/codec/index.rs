use super::CodecError;
use crate::bitstream::{BitReader, BitWrite};

/// Prefix-coded gap buckets. A gap of one is a single bit; the last bucket runs to `N - 1`.
const GAP_BUCKETS: [(i32, i32); 4] = [(2, 5), (6, 13), (14, 29), (30, 61)];
const LAST_BUCKET_MIN: i32 = 62;

fn last_bucket_max(num_objects: usize) -> i32 {
    (num_objects as i32 - 1).max(LAST_BUCKET_MIN)
}

/// Writes `index` as a gap from `previous`. Indices must be strictly increasing.
pub fn write_relative_index<W: BitWrite>(
    writer: &mut W,
    previous: usize,
    index: usize,
    num_objects: usize,
) {
    debug_assert!(index > previous);
    let gap = (index - previous) as i32;

    if gap == 1 {
        writer.write_bool(true);
        return;
    }
    writer.write_bool(false);

    for (min, max) in GAP_BUCKETS {
        if gap <= max {
            writer.write_bool(true);
            writer.write_bounded(gap, min, max);
            return;
        }
        writer.write_bool(false);
    }

    writer.write_bounded(gap, LAST_BUCKET_MIN, last_bucket_max(num_objects));
}

pub fn read_relative_index(
    reader: &mut BitReader<'_>,
    previous: usize,
    num_objects: usize,
) -> Result<usize, CodecError> {
    let gap = if reader.read_bool()? {
        1
    } else {
        let mut gap = None;
        for (min, max) in GAP_BUCKETS {
            if reader.read_bool()? {
                gap = Some(reader.read_bounded(min, max)?);
                break;
            }
        }
        match gap {
            Some(gap) => gap,
            None => reader.read_bounded(LAST_BUCKET_MIN, last_bucket_max(num_objects))?,
        }
    };

    let index = previous + gap as usize;
    if index >= num_objects {
        return Err(CodecError::IndexOutOfRange {
            index,
            num_objects,
        });
    }
    Ok(index)
}
