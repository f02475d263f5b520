//! Text and CSV renderings of a batch of carrier evaluations.

use std::fmt::Write as _;
use std::io::Write;

use crate::underwriting::{CarrierEvaluation, OutcomeOrder};

/// Carrier cards: outcome, weight, and the share of every canonical outcome.
pub fn render_text(evaluations: &[CarrierEvaluation], order: &OutcomeOrder) -> String {
    let mut out = String::new();
    for (index, evaluation) in evaluations.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let result = &evaluation.result;
        let _ = writeln!(out, "{} ({})", evaluation.carrier_name, evaluation.carrier_id);
        let _ = writeln!(out, "  Outcome: {}", result.outcome);
        let _ = writeln!(out, "  Weight: {:.2}", result.weight);
        if result.matches.is_empty() {
            let _ = writeln!(out, "  Matched rules: none");
        } else {
            let names: Vec<&str> = result.matches.iter().map(|rule| rule.display_name()).collect();
            let _ = writeln!(out, "  Matched rules: {}", names.join(", "));
        }
        let _ = writeln!(out, "  Probabilities:");
        for label in order.labels() {
            let _ = writeln!(
                out,
                "    {label}: {:.1}%",
                result.probabilities.share(label) * 100.0
            );
        }
    }
    out
}

/// One row per carrier with a column per canonical outcome.
pub fn write_csv<W: Write>(
    writer: W,
    evaluations: &[CarrierEvaluation],
    order: &OutcomeOrder,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["carrier_id", "carrier_name", "outcome", "weight"];
    header.extend(order.labels().iter().map(String::as_str));
    csv_writer.write_record(&header)?;

    for evaluation in evaluations {
        let result = &evaluation.result;
        let mut row = vec![
            evaluation.carrier_id.clone(),
            evaluation.carrier_name.clone(),
            result.outcome.clone(),
            format!("{:.2}", result.weight),
        ];
        row.extend(
            order
                .labels()
                .iter()
                .map(|label| format!("{:.4}", result.probabilities.share(label))),
        );
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}
