use serde::Serialize;

/// One of the two sides of a word or a link.
///
/// Almost every structure in the parser comes in left/right pairs: outbound
/// links, statistics chains, label lists, adjacency bitmaps. `Side` is used
/// as an index into those pairs via [`Side::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Index into a `[T; 2]` pair.
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Both sides, left first.
    pub fn both() -> [Side; 2] {
        [Side::Left, Side::Right]
    }

    /// The side on which `end` lies relative to `origin`.
    pub fn of(end: i32, origin: i32) -> Side {
        if end < origin {
            Side::Left
        } else {
            Side::Right
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_flips() {
        assert_eq!(Side::Left.opposite(), Side::Right);
        assert_eq!(Side::Right.opposite(), Side::Left);
    }

    #[test]
    fn side_of_position() {
        assert_eq!(Side::of(0, 3), Side::Left);
        assert_eq!(Side::of(5, 3), Side::Right);
        // a position is its own right side by convention
        assert_eq!(Side::of(3, 3), Side::Right);
    }
}
