use std::vec;

use itertools::Itertools;

/// Sequence of "index within parent" steps from the root. The root itself is
/// the empty sequence.
pub type Path = vec::Vec<usize>;
pub type PathSlice<'a> = &'a [usize];

/// Rendered in place of the root's empty path so it stays distinguishable
/// from "no path at all".
pub const ROOT_DESCRIPTION: &str = "<root>";

pub fn describe(path: PathSlice) -> String {
    if path.is_empty() {
        ROOT_DESCRIPTION.to_string()
    } else {
        path.iter().map(|index| index.to_string()).join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[]), ROOT_DESCRIPTION);
        assert_eq!(describe(&[0]), "0");
        assert_eq!(describe(&[1, 0, 12]), "1.0.12");
    }
}
