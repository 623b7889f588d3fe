//! Matrix Market reader.
//!
//! Loads the `A` and `b` operands of a solve from text files.
//!
//! # Supported syntax
//!
//! ```text
//! %%MatrixMarket matrix coordinate real general
//! % comment lines start with '%'
//! 3 3 4                   (rows cols nnz)
//! 1 1 4.0                 (1-based row, col, value)
//! ...
//!
//! %%MatrixMarket matrix array real general
//! 2 1                     (rows cols)
//! 1.0                     (values in column-major order)
//! 2.0
//! ```
//!
//! Fields: `real`, `double`, `integer`, `pattern`.
//! Symmetry: `general`, `symmetric`, `skew-symmetric`.
//! A right-hand side may also be a bare list of numbers.

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while1};
use nom::character::complete::{i64 as int64, space0, space1, u64 as uint64};
use nom::combinator::{all_consuming, map, opt};
use nom::number::complete::double;
use nom::IResult;
use nom::Parser;

use crate::error::{QrSolveError, Result};
use crate::sparse::CsrMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmFormat {
    Coordinate,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmField {
    Real,
    Integer,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmSymmetry {
    General,
    Symmetric,
    SkewSymmetric,
}

/// Entry values, typed by the header's field.
#[derive(Debug, Clone, PartialEq)]
pub enum MmValues {
    Real(Vec<f64>),
    Integer(Vec<i64>),
    Pattern,
}

/// A parsed Matrix Market matrix with symmetric entries already mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixMarket {
    pub nrows: usize,
    pub ncols: usize,
    pub format: MmFormat,
    pub field: MmField,
    pub symmetry: MmSymmetry,
    /// Zero-based (row, col) of every stored entry.
    pub coords: Vec<(usize, usize)>,
    pub values: MmValues,
}

impl MatrixMarket {
    /// CSR with `f64` values; integer fields are widened, patterns become ones.
    pub fn to_csr_f64(&self) -> CsrMatrix<f64> {
        let triplets: Vec<(usize, usize, f64)> = match &self.values {
            MmValues::Real(v) => zip_coords(&self.coords, v.iter().copied()),
            MmValues::Integer(v) => zip_coords(&self.coords, v.iter().map(|&x| x as f64)),
            MmValues::Pattern => zip_coords(&self.coords, std::iter::repeat(1.0)),
        };
        CsrMatrix::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// CSR with `i64` values. Fails for real-valued files.
    pub fn to_csr_i64(&self) -> Result<CsrMatrix<i64>> {
        let triplets: Vec<(usize, usize, i64)> = match &self.values {
            MmValues::Integer(v) => zip_coords(&self.coords, v.iter().copied()),
            MmValues::Pattern => zip_coords(&self.coords, std::iter::repeat(1)),
            MmValues::Real(_) => {
                return Err(QrSolveError::Parse(
                    "real-valued matrix cannot be read as integer".into(),
                ))
            }
        };
        Ok(CsrMatrix::from_triplets(self.nrows, self.ncols, &triplets))
    }

    /// Dense column vector; the matrix must have exactly one column or row.
    pub fn to_dense_vector(&self) -> Result<Vec<f64>> {
        let len = if self.ncols == 1 {
            self.nrows
        } else if self.nrows == 1 {
            self.ncols
        } else {
            return Err(QrSolveError::Parse(format!(
                "expected a vector, got a {}x{} matrix",
                self.nrows, self.ncols
            )));
        };
        let mut out = vec![0.0; len];
        let csr = self.to_csr_f64();
        for (row, col, v) in csr_entries(&csr) {
            out[row.max(col)] += v;
        }
        Ok(out)
    }
}

fn zip_coords<T>(coords: &[(usize, usize)], values: impl Iterator<Item = T>) -> Vec<(usize, usize, T)> {
    coords.iter().zip(values).map(|(&(r, c), v)| (r, c, v)).collect()
}

fn csr_entries(m: &CsrMatrix<f64>) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
    (0..m.nrows).flat_map(move |row| {
        (m.row_pointers[row]..m.row_pointers[row + 1]).map(move |idx| (row, m.col_indices[idx], m.values[idx]))
    })
}

/// Parse a Matrix Market file.
pub fn parse_matrix_market(input: &str) -> Result<MatrixMarket> {
    let mut lines = input.lines().enumerate();

    let (header_num, header_line) = lines
        .next()
        .ok_or_else(|| QrSolveError::Parse("empty input".into()))?;
    let (format, field, symmetry) =
        header(header_line.trim()).map_err(|e| parse_err(header_num, header_line, &e))?;
    if field == MmField::Pattern && symmetry == MmSymmetry::SkewSymmetric {
        return Err(parse_err(header_num, header_line, "pattern matrices cannot be skew-symmetric"));
    }

    // Skip comments and blank lines
    let mut data = lines.filter(|(_, l)| {
        let t = l.trim();
        !t.is_empty() && !t.starts_with('%')
    });

    let (size_num, size_line) = data
        .next()
        .ok_or_else(|| QrSolveError::Parse("missing size line".into()))?;
    let sizes = usize_list(size_line.trim()).map_err(|e| parse_err(size_num, size_line, &e))?;

    let mut mm = MatrixMarket {
        nrows: 0,
        ncols: 0,
        format,
        field,
        symmetry,
        coords: Vec::new(),
        values: match field {
            MmField::Real => MmValues::Real(Vec::new()),
            MmField::Integer => MmValues::Integer(Vec::new()),
            MmField::Pattern => MmValues::Pattern,
        },
    };

    match format {
        MmFormat::Coordinate => {
            let &[nrows, ncols, nnz] = sizes.as_slice() else {
                return Err(parse_err(size_num, size_line, "expected 'rows cols nnz'"));
            };
            check_symmetric_square(symmetry, nrows, ncols, size_num, size_line)?;
            mm.nrows = nrows;
            mm.ncols = ncols;
            let mut seen = 0;
            for (line_num, raw_line) in data {
                let (row, col, value) = coordinate_entry(raw_line.trim(), field)
                    .map_err(|e| parse_err(line_num, raw_line, &e))?;
                if row == 0 || col == 0 || row > nrows || col > ncols {
                    return Err(parse_err(
                        line_num,
                        raw_line,
                        &format!("entry ({row}, {col}) outside a {nrows}x{ncols} matrix"),
                    ));
                }
                mm.push(row - 1, col - 1, value);
                seen += 1;
            }
            if seen != nnz {
                return Err(QrSolveError::Parse(format!(
                    "size line declares {nnz} entries, found {seen}"
                )));
            }
        }
        MmFormat::Array => {
            if field == MmField::Pattern {
                return Err(parse_err(header_num, header_line, "array format cannot be pattern"));
            }
            let &[nrows, ncols] = sizes.as_slice() else {
                return Err(parse_err(size_num, size_line, "expected 'rows cols'"));
            };
            check_symmetric_square(symmetry, nrows, ncols, size_num, size_line)?;
            mm.nrows = nrows;
            mm.ncols = ncols;
            let expected = array_entry_count(nrows, ncols, symmetry)
                .ok_or_else(|| parse_err(size_num, size_line, "matrix size overflows"))?;
            let mut values = data.map(|(line_num, raw_line)| {
                value_token(raw_line.trim(), field).map_err(|e| parse_err(line_num, raw_line, &e))
            });
            for (seen, (row, col)) in array_positions(nrows, ncols, symmetry).enumerate() {
                let value = values.next().ok_or_else(|| {
                    QrSolveError::Parse(format!("expected {expected} values, found {seen}"))
                })??;
                mm.push(row, col, value);
            }
            if values.next().is_some() {
                return Err(QrSolveError::Parse(format!("more than {expected} values")));
            }
        }
    }

    Ok(mm)
}

/// Parse a right-hand side: a one-column Matrix Market file or a
/// whitespace-separated list of numbers.
pub fn parse_vector(input: &str) -> Result<Vec<f64>> {
    if input.trim_start().starts_with("%%") {
        return parse_matrix_market(input)?.to_dense_vector();
    }
    let mut out = Vec::new();
    for (line_num, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') {
            continue;
        }
        for token in line.split(|c: char| c.is_whitespace() || c == ',').filter(|t| !t.is_empty()) {
            let (_, v) = all_consuming(double)
                .parse(token)
                .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                    parse_err(line_num, raw_line, &format!("invalid number '{token}'"))
                })?;
            out.push(v);
        }
    }
    Ok(out)
}

/// A typed entry value before it is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    Real(f64),
    Integer(i64),
    Pattern,
}

impl MatrixMarket {
    fn push(&mut self, row: usize, col: usize, value: Entry) {
        let mirror = row != col && self.symmetry != MmSymmetry::General;
        self.coords.push((row, col));
        if mirror {
            self.coords.push((col, row));
        }
        let skew = self.symmetry == MmSymmetry::SkewSymmetric;
        match (&mut self.values, value) {
            (MmValues::Real(v), Entry::Real(x)) => {
                v.push(x);
                if mirror {
                    v.push(if skew { -x } else { x });
                }
            }
            (MmValues::Integer(v), Entry::Integer(x)) => {
                v.push(x);
                if mirror {
                    v.push(if skew { -x } else { x });
                }
            }
            _ => {}
        }
    }
}

/// Column-major positions of the stored entries, generated on demand.
fn array_positions(
    nrows: usize,
    ncols: usize,
    symmetry: MmSymmetry,
) -> impl Iterator<Item = (usize, usize)> {
    (0..ncols).flat_map(move |col| {
        let first_row = match symmetry {
            MmSymmetry::General => 0,
            MmSymmetry::Symmetric => col,
            MmSymmetry::SkewSymmetric => col + 1,
        };
        (first_row..nrows).map(move |row| (row, col))
    })
}

/// Number of stored entries for an array-format matrix, `None` on overflow.
fn array_entry_count(nrows: usize, ncols: usize, symmetry: MmSymmetry) -> Option<usize> {
    match symmetry {
        MmSymmetry::General => nrows.checked_mul(ncols),
        MmSymmetry::Symmetric => nrows.checked_mul(nrows.checked_add(1)?).map(|v| v / 2),
        MmSymmetry::SkewSymmetric => nrows.checked_mul(nrows.saturating_sub(1)).map(|v| v / 2),
    }
}

fn check_symmetric_square(
    symmetry: MmSymmetry,
    nrows: usize,
    ncols: usize,
    line_num: usize,
    raw_line: &str,
) -> Result<()> {
    if symmetry != MmSymmetry::General && nrows != ncols {
        return Err(parse_err(
            line_num,
            raw_line,
            &format!("{symmetry:?} matrix must be square, got {nrows}x{ncols}"),
        ));
    }
    Ok(())
}

fn parse_err(line_num: usize, raw_line: &str, detail: &str) -> QrSolveError {
    QrSolveError::Parse(format!("line {}: {} in: {}", line_num + 1, detail, raw_line))
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parse: %%MatrixMarket matrix <format> <field> <symmetry>
fn header(line: &str) -> std::result::Result<(MmFormat, MmField, MmSymmetry), String> {
    let (_, (_, _, _, _, format, _, field, _, symmetry, _)) = all_consuming((
        tag("%%MatrixMarket"),
        space1,
        tag_no_case("matrix"),
        space1,
        mm_format,
        space1,
        mm_field,
        space1,
        mm_symmetry,
        space0,
    ))
    .parse(line)
    .map_err(|_| "invalid Matrix Market header".to_string())?;
    Ok((format, field, symmetry))
}

fn mm_format(input: &str) -> IResult<&str, MmFormat> {
    alt((
        map(tag_no_case("coordinate"), |_: &str| MmFormat::Coordinate),
        map(tag_no_case("array"), |_: &str| MmFormat::Array),
    ))
    .parse(input)
}

fn mm_field(input: &str) -> IResult<&str, MmField> {
    alt((
        map(tag_no_case("real"), |_: &str| MmField::Real),
        map(tag_no_case("double"), |_: &str| MmField::Real),
        map(tag_no_case("integer"), |_: &str| MmField::Integer),
        map(tag_no_case("pattern"), |_: &str| MmField::Pattern),
    ))
    .parse(input)
}

fn mm_symmetry(input: &str) -> IResult<&str, MmSymmetry> {
    // Order matters: skew-symmetric before symmetric
    alt((
        map(tag_no_case("general"), |_: &str| MmSymmetry::General),
        map(tag_no_case("skew-symmetric"), |_: &str| MmSymmetry::SkewSymmetric),
        map(tag_no_case("symmetric"), |_: &str| MmSymmetry::Symmetric),
    ))
    .parse(input)
}

// ---------------------------------------------------------------------------
// Size and entry lines
// ---------------------------------------------------------------------------

fn index(input: &str) -> IResult<&str, usize> {
    map(uint64, |v| v as usize).parse(input)
}

fn usize_list(line: &str) -> std::result::Result<Vec<usize>, String> {
    let mut out = Vec::new();
    for token in line.split_whitespace() {
        let (_, v) = all_consuming(index)
            .parse(token)
            .map_err(|_| format!("invalid size '{token}'"))?;
        out.push(v);
    }
    Ok(out)
}

fn value_token(line: &str, field: MmField) -> std::result::Result<Entry, String> {
    let parsed: IResult<&str, Entry> = match field {
        MmField::Real => all_consuming(map(double, Entry::Real)).parse(line),
        MmField::Integer => all_consuming(map(int64, Entry::Integer)).parse(line),
        MmField::Pattern => return Ok(Entry::Pattern),
    };
    parsed
        .map(|(_, v)| v)
        .map_err(|_| format!("invalid {field:?} value"))
}

/// Parse: row col [value]
fn coordinate_entry(line: &str, field: MmField) -> std::result::Result<(usize, usize, Entry), String> {
    let (rest, (row, _, col)) = (index, space1, index)
        .parse(line)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| "expected 'row col'".to_string())?;
    let (rest, value) = opt((space1, take_while1(|c: char| !c.is_whitespace())))
        .parse(rest)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| "malformed entry".to_string())?;
    if !rest.trim().is_empty() {
        return Err("trailing characters after entry".to_string());
    }
    let entry = match (field, value) {
        (MmField::Pattern, None) => Entry::Pattern,
        (MmField::Pattern, Some(_)) => return Err("pattern entries take no value".to_string()),
        (_, None) => return Err("missing value".to_string()),
        (_, Some((_, token))) => value_token(token, field)?,
    };
    Ok((row, col, entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_general() {
        let input = "\
%%MatrixMarket matrix coordinate real general
% the 2x2 system from the docs
2 2 4
1 1 4.0
1 2 1
2 1 1.0
2 2 3e0
";
        let mm = parse_matrix_market(input).unwrap();
        assert_eq!((mm.nrows, mm.ncols), (2, 2));
        assert_eq!(mm.field, MmField::Real);
        let csr = mm.to_csr_f64();
        assert_eq!(csr.to_dense(), vec![vec![4.0, 1.0], vec![1.0, 3.0]]);
    }

    #[test]
    fn test_symmetric_mirrors_off_diagonal() {
        let input = "\
%%MatrixMarket matrix coordinate integer symmetric
2 2 3
1 1 4
2 1 1
2 2 3
";
        let mm = parse_matrix_market(input).unwrap();
        let csr = mm.to_csr_i64().unwrap();
        assert_eq!(csr.to_dense(), vec![vec![4, 1], vec![1, 3]]);
    }

    #[test]
    fn test_skew_symmetric_negates_mirror() {
        let input = "\
%%MatrixMarket matrix coordinate real skew-symmetric
2 2 1
2 1 5.0
";
        let csr = parse_matrix_market(input).unwrap().to_csr_f64();
        assert_eq!(csr.to_dense(), vec![vec![0.0, -5.0], vec![5.0, 0.0]]);
    }

    #[test]
    fn test_pattern_becomes_ones() {
        let input = "%%MatrixMarket matrix coordinate pattern general\n2 2 2\n1 1\n2 2\n";
        let csr = parse_matrix_market(input).unwrap().to_csr_f64();
        assert_eq!(csr.to_dense(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_array_column_major() {
        let input = "%%MatrixMarket matrix array real general\n2 2\n1\n3\n2\n4\n";
        let csr = parse_matrix_market(input).unwrap().to_csr_f64();
        assert_eq!(csr.to_dense(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_array_vector() {
        let input = "%%MatrixMarket matrix array real general\n3 1\n1.5\n-2\n0.25\n";
        let v = parse_vector(input).unwrap();
        assert_eq!(v, vec![1.5, -2.0, 0.25]);
    }

    #[test]
    fn test_plain_vector() {
        let v = parse_vector("# rhs\n1 2\n3.5,4e1\n").unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.5, 40.0]);
    }

    #[test]
    fn test_entry_count_mismatch() {
        let input = "%%MatrixMarket matrix coordinate real general\n2 2 3\n1 1 1.0\n";
        let err = parse_matrix_market(input).unwrap_err();
        assert!(format!("{err}").contains("declares 3 entries"));
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let input = "%%MatrixMarket matrix coordinate real general\n2 2 1\n3 1 1.0\n";
        let err = parse_matrix_market(input).unwrap_err();
        assert!(format!("{err}").contains("line 3"), "got: {err}");
    }

    #[test]
    fn test_bad_header() {
        let err = parse_matrix_market("%%MatrixMarket tensor coordinate real general\n").unwrap_err();
        assert!(matches!(err, QrSolveError::Parse(_)));
    }

    #[test]
    fn test_real_not_readable_as_integer() {
        let input = "%%MatrixMarket matrix coordinate real general\n1 1 1\n1 1 2.5\n";
        assert!(parse_matrix_market(input).unwrap().to_csr_i64().is_err());
    }

    #[test]
    fn test_invalid_vector_token() {
        let err = parse_vector("1.0 abc\n").unwrap_err();
        assert!(format!("{err}").contains("abc"));
    }

    #[test]
    fn test_array_oversized_header_fails_cleanly() {
        let input = "%%MatrixMarket matrix array real general\n100000 100000\n1.0\n";
        let err = parse_matrix_market(input).unwrap_err();
        assert!(matches!(err, QrSolveError::Parse(_)));
        assert!(format!("{err}").contains("found 1"), "got: {err}");
    }

    #[test]
    fn test_array_size_overflow() {
        let input = format!("%%MatrixMarket matrix array real general\n{} 2\n1.0\n", usize::MAX);
        let err = parse_matrix_market(&input).unwrap_err();
        assert!(format!("{err}").contains("overflows"), "got: {err}");
    }

    #[test]
    fn test_array_symmetric_lower_triangle() {
        let input = "%%MatrixMarket matrix array real symmetric\n2 2\n4\n1\n3\n";
        let mm = parse_matrix_market(input).unwrap();
        assert_eq!(mm.to_csr_f64().to_dense(), vec![vec![4.0, 1.0], vec![1.0, 3.0]]);
    }

    #[test]
    fn test_array_too_many_values() {
        let input = "%%MatrixMarket matrix array real general\n1 1\n1\n2\n";
        let err = parse_matrix_market(input).unwrap_err();
        assert!(format!("{err}").contains("more than 1"), "got: {err}");
    }

    #[test]
    fn test_symmetric_must_be_square() {
        let input = "%%MatrixMarket matrix coordinate real symmetric\n2 3 1\n1 1 1.0\n";
        assert!(matches!(parse_matrix_market(input), Err(QrSolveError::Parse(_))));
    }
}
