use crate::autofill::orchestrator::{SessionReport, SubmitOutcome};
use crate::field::field_model::FieldValue;
use crate::store::record::FormRecord;

// ============================================================================
// Console output: record listings and session summaries
// ============================================================================

/// Records grouped by page, like:
/// ```text
/// https://example.com/login (2 forms)
///   form_1700000000000_a1b2c3  Work login  3 fields  [auto-fill] [auto-submit]
///   form_1700000000001_d4e5f6  Personal    3 fields
/// ```
pub fn format_record_groups(groups: &[(String, Vec<&FormRecord>)]) -> String {
    if groups.is_empty() {
        return "No saved forms.\n".to_string();
    }

    let mut out = String::new();
    for (pattern, records) in groups {
        let noun = if records.len() == 1 { "form" } else { "forms" };
        out.push_str(&format!("{} ({} {})\n", pattern, records.len(), noun));
        for record in records {
            out.push_str(&format!("  {}\n", format_record_line(record)));
        }
    }
    out
}

pub fn format_record_line(record: &FormRecord) -> String {
    let noun = if record.fields.len() == 1 { "field" } else { "fields" };
    let mut line = format!(
        "{}  {}  {} {}",
        record.id,
        record.title,
        record.fields.len(),
        noun
    );
    if record.auto_fill {
        line.push_str("  [auto-fill]");
    }
    if record.auto_confirm {
        line.push_str("  [auto-submit]");
    }
    line
}

/// One record with every field. Password values are masked.
pub fn format_record_detail(record: &FormRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", record.title));
    out.push_str(&format!("id:          {}\n", record.id));
    out.push_str(&format!("url:         {}\n", record.url));
    out.push_str(&format!("pattern:     {}\n", record.url_pattern));
    out.push_str(&format!("auto-fill:   {}\n", on_off(record.auto_fill)));
    out.push_str(&format!("auto-submit: {}\n", on_off(record.auto_confirm)));
    if let Some(selector) = &record.submit_selector {
        out.push_str(&format!("submit:      {}\n", selector));
    }

    out.push_str(&format!("\nFields ({}):\n", record.fields.len()));
    for (i, field) in record.fields.iter().enumerate() {
        let value = match &field.value {
            FieldValue::Bool(b) => on_off(*b).to_string(),
            FieldValue::Text(_) if field.field_type == "password" => "••••••".to_string(),
            FieldValue::Text(t) => format!("{:?}", t),
        };
        out.push_str(&format!(
            "  [{}] {} ({}) = {}\n",
            i, field.label, field.field_type, value
        ));
    }
    out
}

/// Summary of one unattended session.
pub fn format_session_report(report: &SessionReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Autofill session: {:?} after {:.1}s ===\n",
        report.phase,
        report.elapsed.as_secs_f64()
    ));
    out.push_str(&format!(
        "Ticks: {} ({} ready), fields filled: {}\n",
        report.ticks, report.ready_ticks, report.fields_filled
    ));

    let submit = match report.outcome {
        SubmitOutcome::NotRequested => "not requested".to_string(),
        SubmitOutcome::Clicked => match report.clicked {
            Some(m) => format!("clicked ({:?} in frame {})", m.tier, m.frame.0),
            None => "clicked".to_string(),
        },
        SubmitOutcome::Relayed(outcome) => format!("relayed to top frame: {:?}", outcome),
        SubmitOutcome::GaveUp => format!(
            "no submit control found after {} retries",
            report.submit_retries
        ),
        SubmitOutcome::Cancelled => "cancelled".to_string(),
    };
    out.push_str(&format!("Submit: {}\n", submit));

    if report.cancelled {
        out.push_str("Session was cancelled.\n");
    }
    out
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
