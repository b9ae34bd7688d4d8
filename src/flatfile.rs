//! Flat text files for parameter vectors and covariance matrices.
//!
//! Both layouts share the same line rules:
//!
//! - a line ending in `\` is joined with the next line, separated by a space
//! - `#` starts a comment that runs to the end of the (joined) line
//! - lines that are blank after comment removal are skipped
//!
//! A parameter file holds one number per line. A covariance file holds one
//! matrix row per line, entries separated by whitespace.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SpecFitError};
use crate::uncertainty::CovarianceMatrix;

/// Read logical lines from `reader`.
pub fn read_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();

        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }

        pending.push_str(line);
        push_logical_line(&mut lines, &pending);
        pending.clear();
    }

    // A continuation marker on the last line joins with nothing.
    if !pending.is_empty() {
        push_logical_line(&mut lines, &pending);
    }

    Ok(lines)
}

fn push_logical_line(lines: &mut Vec<String>, joined: &str) {
    let content = match joined.find('#') {
        Some(pos) => &joined[..pos],
        None => joined,
    };
    let content = content.trim();
    if !content.is_empty() {
        lines.push(content.to_string());
    }
}

/// Read logical lines from the file at `path`.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let file = File::open(path.as_ref())?;
    read_lines(BufReader::new(file))
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse()
        .map_err(|_| SpecFitError::Parse(format!("invalid number '{}'", text)))
}

/// Parse one value per line; the number of lines must equal `expected`.
pub fn parse_parameters(lines: &[String], expected: usize) -> Result<Vec<f64>> {
    if lines.len() != expected {
        return Err(SpecFitError::ParameterCountMismatch {
            expected,
            found: lines.len(),
        });
    }
    lines.iter().map(|line| parse_number(line)).collect()
}

/// Parse an `n×n` matrix, one row per line.
pub fn parse_covariance(lines: &[String], n: usize) -> Result<CovarianceMatrix> {
    if lines.len() != n {
        return Err(SpecFitError::CovarianceFormatError(format!(
            "found {} rows, expected {}",
            lines.len(),
            n
        )));
    }

    let mut rows = Vec::with_capacity(n);
    for (i, line) in lines.iter().enumerate() {
        let row = line
            .split_whitespace()
            .map(parse_number)
            .collect::<Result<Vec<f64>>>()?;
        if row.len() != n {
            return Err(SpecFitError::CovarianceFormatError(format!(
                "row {} has {} columns, expected {}",
                i + 1,
                row.len(),
                n
            )));
        }
        rows.push(row);
    }

    CovarianceMatrix::from_rows(rows)
}

/// Write one value per line.
pub fn write_parameters<P: AsRef<Path>>(path: P, values: &[f64]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for value in values {
        writeln!(writer, "{}", value)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one matrix row per line, entries separated by spaces.
pub fn write_covariance<P: AsRef<Path>>(path: P, matrix: &CovarianceMatrix) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write!(writer, "{}", matrix)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lines_of(text: &str) -> Vec<String> {
        read_lines(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let lines = lines_of("# header\n1.5   # first\n\n   \n2.5\r\n#\n");
        assert_eq!(lines, vec!["1.5", "2.5"]);
    }

    #[test]
    fn test_continuation_lines() {
        let lines = lines_of("1 2 \\\n3 # comment \\\n4\n");
        // The comment is stripped after joining, so it swallows the rest of
        // the logical line.
        assert_eq!(lines, vec!["1 2  3"]);

        let lines = lines_of("1 \\\n2\n3\\");
        assert_eq!(lines, vec!["1  2", "3"]);
    }

    #[test]
    fn test_parse_parameters() {
        let lines = lines_of("1.0\n-2e-3\n");
        assert_eq!(parse_parameters(&lines, 2).unwrap(), vec![1.0, -2e-3]);

        assert!(matches!(
            parse_parameters(&lines, 3),
            Err(SpecFitError::ParameterCountMismatch {
                expected: 3,
                found: 2
            })
        ));

        let bad = lines_of("1.0\nabc\n");
        assert!(matches!(parse_parameters(&bad, 2), Err(SpecFitError::Parse(_))));
    }

    #[test]
    fn test_parse_covariance() {
        let lines = lines_of("1 0.5\n0.5 2\n");
        let matrix = parse_covariance(&lines, 2).unwrap();
        assert_eq!(matrix.get(0, 1), Some(0.5));

        let short_row = lines_of("1 0.5\n0.5\n");
        assert!(matches!(
            parse_covariance(&short_row, 2),
            Err(SpecFitError::CovarianceFormatError(_))
        ));

        let extra_row = lines_of("1 0\n0 1\n0 0\n");
        assert!(matches!(
            parse_covariance(&extra_row, 2),
            Err(SpecFitError::CovarianceFormatError(_))
        ));

        let bad_number = lines_of("1 x\n0 1\n");
        assert!(matches!(parse_covariance(&bad_number, 2), Err(SpecFitError::Parse(_))));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let par = dir.path().join("eff.par");
        let cov = dir.path().join("eff.cov");

        write_parameters(&par, &[1.25, -3.0]).unwrap();
        let matrix = CovarianceMatrix::from_rows(vec![vec![0.5, 0.1], vec![0.1, 0.25]]).unwrap();
        write_covariance(&cov, &matrix).unwrap();

        assert_eq!(std::fs::read_to_string(&par).unwrap(), "1.25\n-3\n");
        assert_eq!(std::fs::read_to_string(&cov).unwrap(), "0.5 0.1\n0.1 0.25\n");

        let values = parse_parameters(&read_file(&par).unwrap(), 2).unwrap();
        assert_eq!(values, vec![1.25, -3.0]);
        let back = parse_covariance(&read_file(&cov).unwrap(), 2).unwrap();
        assert_eq!(back, matrix);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_file(dir.path().join("missing.par")),
            Err(SpecFitError::Io(_))
        ));
    }
}
