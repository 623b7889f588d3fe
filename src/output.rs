//! Results output formatting (CSV).

use crate::error::Result;
use crate::solver::LsqrResult;
use std::io::Write;

/// Write the scalar slots of a solve as CSV.
///
/// Slots the native routine does not report are written with an empty value.
///
/// Format:
/// ```csv
/// Field,Value
/// precision,double
/// istop,
/// itn,
/// r1norm,1.2e-16
/// ...
/// xnorm,0.6428
/// singularity,-1
/// ```
pub fn write_summary_csv<W: Write>(result: &LsqrResult, writer: &mut W) -> Result<()> {
    fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
        v.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    writeln!(writer, "Field,Value")?;
    writeln!(writer, "precision,{}", result.precision)?;
    writeln!(writer, "istop,{}", opt(&result.istop))?;
    writeln!(writer, "itn,{}", opt(&result.itn))?;
    writeln!(writer, "r1norm,{}", result.r1norm)?;
    writeln!(writer, "r2norm,{}", opt(&result.r2norm))?;
    writeln!(writer, "anorm,{}", opt(&result.anorm))?;
    writeln!(writer, "acond,{}", opt(&result.acond))?;
    writeln!(writer, "arnorm,{}", opt(&result.arnorm))?;
    writeln!(writer, "xnorm,{}", result.xnorm)?;
    match result.singularity {
        Some(j) => writeln!(writer, "singularity,{}", j)?,
        None => writeln!(writer, "singularity,-1")?,
    }
    Ok(())
}

/// Write the solution vector as CSV.
///
/// Format:
/// ```csv
/// Index,X
/// 0,0.09090909090909091
/// 1,0.6363636363636364
/// ```
pub fn write_solution_csv<W: Write>(result: &LsqrResult, writer: &mut W) -> Result<()> {
    writeln!(writer, "Index,X")?;
    for (i, x) in result.x.iter().enumerate() {
        writeln!(writer, "{},{}", i, x)?;
    }
    Ok(())
}
