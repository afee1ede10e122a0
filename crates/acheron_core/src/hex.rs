//! Adjacency over the fixed hex field.
//!
//! The field is 17 columns of 12 pointy-top hexes, indexed column-major
//! (`index = col * ROWS + row`). Odd columns sit half a hex lower than even
//! columns. Both axes wrap, so every step lands on a valid index; callers that
//! want hard edges ask [`crosses_edge`] first.

use crate::types::Direction;

pub const ROWS: usize = 12;
pub const COLS: usize = 17;
pub const HEX_COUNT: usize = ROWS * COLS;

pub type HexIndex = usize;

/// Reduces any integer to a valid hex index.
pub fn wrap_hex(value: i64) -> HexIndex {
    value.rem_euclid(HEX_COUNT as i64) as HexIndex
}

/// `(column, row)` of a hex.
pub fn coords(hex: HexIndex) -> (usize, usize) {
    let hex = hex % HEX_COUNT;
    (hex / ROWS, hex % ROWS)
}

pub fn index(col: usize, row: usize) -> HexIndex {
    (col % COLS) * ROWS + (row % ROWS)
}

/// One step without wrapping; the result may lie outside the field.
fn raw_step(hex: HexIndex, direction: Direction) -> (i64, i64) {
    let (col, row) = coords(hex);
    let (col, row) = (col as i64, row as i64);
    let even = col % 2 == 0;
    match direction.value() {
        0 => (col, row - 1),
        1 => (col + 1, if even { row } else { row - 1 }),
        2 => (col + 1, if even { row + 1 } else { row }),
        3 => (col, row + 1),
        // Leftward steps are keyed on the destination column so they undo the
        // rightward ones, including across the odd-width 16 -> 0 seam.
        4 => {
            let dest_even = (col - 1).rem_euclid(COLS as i64) % 2 == 0;
            (col - 1, if dest_even { row } else { row + 1 })
        }
        _ => {
            let dest_even = (col - 1).rem_euclid(COLS as i64) % 2 == 0;
            (col - 1, if dest_even { row - 1 } else { row })
        }
    }
}

fn step(hex: HexIndex, direction: Direction) -> HexIndex {
    let (col, row) = raw_step(hex, direction);
    index(
        col.rem_euclid(COLS as i64) as usize,
        row.rem_euclid(ROWS as i64) as usize,
    )
}

/// Moves `offset` steps along `direction`. A negative offset walks the
/// opposite bearing.
pub fn adjacent(hex: HexIndex, direction: Direction, offset: i64) -> HexIndex {
    let direction = if offset < 0 {
        direction.opposite()
    } else {
        direction
    };
    let mut current = hex % HEX_COUNT;
    for _ in 0..offset.unsigned_abs() {
        current = step(current, direction);
    }
    current
}

pub fn opposite(direction: Direction) -> Direction {
    direction.opposite()
}

/// True when one step from `hex` along `direction` leaves the field and
/// only lands back on it through wrapping.
pub fn crosses_edge(hex: HexIndex, direction: Direction) -> bool {
    let (col, row) = raw_step(hex, direction);
    col < 0 || col >= COLS as i64 || row < 0 || row >= ROWS as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbours(hex: HexIndex) -> Vec<HexIndex> {
        Direction::all().map(|d| adjacent(hex, d, 1)).collect()
    }

    #[test]
    fn neighbours_of_corners() {
        assert_eq!(neighbours(0), vec![11, 12, 13, 1, 192, 203]);
        assert_eq!(neighbours(12), vec![23, 35, 24, 13, 0, 11]);
        assert_eq!(neighbours(203), vec![202, 11, 0, 192, 180, 191]);
    }

    #[test]
    fn interior_even_and_odd_columns() {
        // col 2 row 5
        assert_eq!(neighbours(29), vec![28, 41, 42, 30, 18, 17]);
        // col 3 row 5
        assert_eq!(neighbours(41), vec![40, 52, 53, 42, 29, 28]);
    }

    #[test]
    fn zero_offset_is_identity() {
        assert_eq!(adjacent(77, Direction::new(2), 0), 77);
    }

    #[test]
    fn negative_offset_walks_backwards() {
        let forward = adjacent(50, Direction::new(1), 3);
        assert_eq!(adjacent(forward, Direction::new(1), -3), 50);
    }

    #[test]
    fn every_step_is_undone_by_the_opposite_step() {
        for hex in 0..HEX_COUNT {
            for d in Direction::all() {
                assert_eq!(adjacent(adjacent(hex, d, 1), d.opposite(), 1), hex);
            }
        }
    }

    #[test]
    fn crossing_is_symmetric() {
        for hex in 0..HEX_COUNT {
            for d in Direction::all() {
                let there = adjacent(hex, d, 1);
                assert_eq!(crosses_edge(hex, d), crosses_edge(there, d.opposite()));
            }
        }
    }

    #[test]
    fn interior_steps_never_cross_an_edge() {
        let (col, row) = coords(5 * ROWS + 6);
        assert_eq!((col, row), (5, 6));
        for d in Direction::all() {
            assert!(!crosses_edge(5 * ROWS + 6, d));
        }
    }

    #[test]
    fn edge_crossings_match_wrapped_coordinates() {
        // top of column 0
        assert!(crosses_edge(0, Direction::new(0)));
        assert!(crosses_edge(0, Direction::new(4)));
        assert!(crosses_edge(0, Direction::new(5)));
        assert!(!crosses_edge(0, Direction::new(1)));
        assert!(!crosses_edge(0, Direction::new(3)));
        // bottom of column 0
        assert!(crosses_edge(11, Direction::new(2)));
        assert!(crosses_edge(11, Direction::new(3)));
        assert!(!crosses_edge(11, Direction::new(1)));
        assert!(crosses_edge(11, Direction::new(4)));
        // last column, rightward
        assert!(crosses_edge(16 * ROWS + 4, Direction::new(1)));
        assert!(crosses_edge(16 * ROWS + 4, Direction::new(2)));
    }
}
