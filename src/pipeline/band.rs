// Band partitioning
//
// A frame is split into horizontal bands, one per worker. Every band gets
// `height / workers` rows and the last band also takes the remainder, so the
// last worker may do a little more work than the rest.

use super::ConfigError;
use std::ops::Range;

/// Horizontal slice of a frame assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Worker index this band belongs to
    pub index: usize,
    /// First source row
    pub start_row: usize,
    /// Number of source rows
    pub row_count: usize,
}

impl Band {
    /// One past the last source row
    pub fn end_row(&self) -> usize {
        self.start_row + self.row_count
    }

    /// Source rows as a range
    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.end_row()
    }

    /// Byte range of this band in a source frame whose rows are `row_bytes` long
    pub fn source_range(&self, row_bytes: usize) -> Range<usize> {
        self.start_row * row_bytes..self.end_row() * row_bytes
    }

    /// Byte range of this band in a destination enlarged by `scale`
    ///
    /// `row_bytes` is the length of one unscaled source row.
    pub fn dest_range(&self, row_bytes: usize, scale: usize) -> Range<usize> {
        let scaled_row = row_bytes * scale;
        self.start_row * scale * scaled_row..self.end_row() * scale * scaled_row
    }
}

/// Split `height` rows across `workers` bands
///
/// # Errors
/// Returns `ConfigError::EmptyFrame` for a zero height and
/// `ConfigError::TooManyWorkers` when some band would get no rows.
///
/// # Example
/// ```
/// use frameband::pipeline::partition;
///
/// let bands = partition(100, 3).unwrap();
/// assert_eq!(bands[2].rows(), 66..100);
/// ```
pub fn partition(height: usize, workers: usize) -> Result<Vec<Band>, ConfigError> {
    if height == 0 {
        return Err(ConfigError::EmptyFrame { width: 0, height });
    }
    if workers == 0 || workers > height {
        return Err(ConfigError::TooManyWorkers { workers, height });
    }

    let row_count = height / workers;
    let bands = (0..workers)
        .map(|index| {
            let start_row = index * row_count;
            let rows = if index + 1 == workers {
                height - start_row
            } else {
                row_count
            };
            Band {
                index,
                start_row,
                row_count: rows,
            }
        })
        .collect();

    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_way_split_of_100_rows() {
        let bands = partition(100, 3).unwrap();
        let rows: Vec<_> = bands.iter().map(Band::rows).collect();
        assert_eq!(rows, vec![0..33, 33..66, 66..100]);
        assert_eq!(bands[2].row_count, 34);
    }

    #[test]
    fn test_partition_covers_height_without_overlap() {
        for height in 1..=64 {
            for workers in 1..=height {
                let bands = partition(height, workers).unwrap();
                assert_eq!(bands.len(), workers);
                assert_eq!(bands[0].start_row, 0);
                for pair in bands.windows(2) {
                    assert_eq!(pair[0].end_row(), pair[1].start_row);
                }
                let last = bands.last().unwrap();
                assert_eq!(last.end_row(), height);
                assert_eq!(
                    last.row_count,
                    height - (height / workers) * (workers - 1)
                );
                assert!(bands.iter().all(|b| b.row_count > 0));
            }
        }
    }

    #[test]
    fn test_more_workers_than_rows_is_rejected() {
        assert!(matches!(
            partition(4, 5),
            Err(ConfigError::TooManyWorkers {
                workers: 5,
                height: 4
            })
        ));
    }

    #[test]
    fn test_zero_workers_or_rows_rejected() {
        assert!(partition(10, 0).is_err());
        assert!(matches!(
            partition(0, 1),
            Err(ConfigError::EmptyFrame { .. })
        ));
    }

    #[test]
    fn test_byte_ranges() {
        let band = Band {
            index: 1,
            start_row: 10,
            row_count: 5,
        };
        assert_eq!(band.source_range(40), 400..600);
        // scale 2: each source row becomes two rows of 80 bytes
        assert_eq!(band.dest_range(40, 2), 1600..2400);
    }
}
