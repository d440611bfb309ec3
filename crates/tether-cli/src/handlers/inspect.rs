//! Certificate inspection handler

use super::read_certificate;
use crate::cli::InspectArgs;
use crate::error::Result;
use crate::output::OutputWriter;

/// Print fingerprint, subject, validity and key algorithm of a DER file
pub async fn handle_inspect(args: InspectArgs, output: &mut OutputWriter) -> Result<()> {
    let (_, summary) = read_certificate(&args.certificate)?;
    tracing::debug!(path = %args.certificate.display(), fingerprint = %summary.fingerprint, "Inspected certificate");
    output.certificate(&summary)
}
