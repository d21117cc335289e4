use std::error::Error;
use std::time::Duration;

use serde::Serialize;

use crate::autofill::error::AutofillError;
use crate::autofill::frames::{FrameId, PageContext, TabPage};
use crate::autofill::orchestrator::{TimingConfig, run_session};
use crate::autofill::scheduler::{Clock, ManualClock, SystemClock};
use crate::browser::session::{DriverConfig, DriverSession, LivePage, PageDriver, PageSnapshot};
use crate::cli::config::{PageSource, Switch};
use crate::dom::dom_model::Mutation;
use crate::field::field_model::FieldValue;
use crate::field::synthesis::capture_fields;
use crate::messaging::coordinator::Coordinator;
use crate::messaging::message::{Message, Reply};
use crate::messaging::transport::Transport;
use crate::report::console::{
    format_record_detail, format_record_groups, format_record_line, format_session_report,
};
use crate::store::record::{FormRecord, RecordUpdate, now_ms};
use crate::store::store::StoreResult;
use crate::store::transfer::{
    backup_file_name, export_records, group_by_pattern, import_records, search_records,
};
use crate::store::url_pattern::normalize_url;
use crate::trace::logger::TraceLogger;

type CmdResult = Result<String, Box<dyn Error>>;

// ============================================================================
// Reply helpers
// ============================================================================

fn expect_records(reply: Reply) -> Result<Vec<FormRecord>, Box<dyn Error>> {
    match reply {
        Reply::Records(records) => Ok(records),
        Reply::Error(e) => Err(e.error.into()),
        other => Err(format!("Unexpected reply: {:?}", other).into()),
    }
}

fn expect_stored(reply: Reply) -> Result<StoreResult, Box<dyn Error>> {
    match reply {
        Reply::Store(result) if result.success => Ok(result),
        Reply::Store(result) => Err(result.error.unwrap_or_else(|| "Store request failed".into()).into()),
        Reply::Error(e) => Err(e.error.into()),
        other => Err(format!("Unexpected reply: {:?}", other).into()),
    }
}

fn find_record(coordinator: &Coordinator, id: &str) -> Result<FormRecord, Box<dyn Error>> {
    coordinator
        .store()
        .get(id)?
        .ok_or_else(|| AutofillError::RecordNotFound(id.to_string()).into())
}

// ============================================================================
// Pages
// ============================================================================

/// Read a snapshot file, or open the URL in the driver and snapshot it.
pub fn read_page(source: &PageSource, driver: &DriverConfig) -> Result<PageSnapshot, Box<dyn Error>> {
    if let Some(path) = &source.snapshot {
        let text = std::fs::read_to_string(path)?;
        return Ok(PageSnapshot::from_json(&text)?);
    }
    let url = source.url.as_deref().ok_or("Either --snapshot or --url is required")?;
    let mut session = DriverSession::launch(driver)?;
    session.navigate(url)?;
    let snapshot = session.snapshot()?;
    session.quit()?;
    Ok(snapshot)
}

// ============================================================================
// capture subcommand
// ============================================================================

pub fn cmd_capture(
    coordinator: &mut Coordinator,
    source: &PageSource,
    frame: usize,
    title: Option<&str>,
    driver: &DriverConfig,
) -> CmdResult {
    let snapshot = read_page(source, driver)?;
    let page_title = title.map(str::to_string).unwrap_or_else(|| snapshot.title.clone());
    let tab = snapshot.into_tab()?;
    let target = tab
        .frame(FrameId(frame))
        .ok_or_else(|| AutofillError::NothingCaptured(format!("page has no frame {}", frame)))?;

    let capture = capture_fields(&target.document);
    if capture.fields.is_empty() {
        return Err(AutofillError::NothingCaptured("No form fields found on this page".into()).into());
    }

    let record = FormRecord::from_capture(&target.url, &page_title, capture, now_ms());
    let line = format_record_line(&record);
    expect_stored(coordinator.handle(Message::SaveForm { form_record: record }))?;
    Ok(format!("Saved {}\n", line))
}

// ============================================================================
// list / search / show
// ============================================================================

pub fn cmd_list(coordinator: &mut Coordinator, url: Option<&str>) -> CmdResult {
    let records = match url {
        Some(url) => expect_records(coordinator.handle(Message::GetFormsForUrl {
            url_pattern: normalize_url(url),
        }))?,
        None => expect_records(coordinator.handle(Message::GetAllForms))?,
    };
    let refs: Vec<&FormRecord> = records.iter().collect();
    Ok(format_record_groups(&group_by_pattern(&refs)))
}

pub fn cmd_search(coordinator: &mut Coordinator, query: &str) -> CmdResult {
    let records = expect_records(coordinator.handle(Message::GetAllForms))?;
    let hits = search_records(&records, query);
    Ok(format_record_groups(&group_by_pattern(&hits)))
}

pub fn cmd_show(coordinator: &mut Coordinator, id: &str) -> CmdResult {
    Ok(format_record_detail(&find_record(coordinator, id)?))
}

// ============================================================================
// edits
// ============================================================================

pub fn cmd_rename(coordinator: &mut Coordinator, id: &str, title: &str) -> CmdResult {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title must not be empty".into());
    }
    expect_stored(coordinator.handle(Message::UpdateForm {
        id: id.to_string(),
        updates: RecordUpdate::title(title),
    }))?;
    Ok(format!("Renamed {} to \"{}\"\n", id, title))
}

pub fn cmd_toggle(
    coordinator: &mut Coordinator,
    id: &str,
    auto_fill: Option<Switch>,
    auto_submit: Option<Switch>,
) -> CmdResult {
    let updates = RecordUpdate {
        auto_fill: auto_fill.map(Switch::enabled),
        auto_confirm: auto_submit.map(Switch::enabled),
        ..Default::default()
    };
    if updates.is_empty() {
        return Err("Nothing to change: pass --auto-fill and/or --auto-submit".into());
    }
    expect_stored(coordinator.handle(Message::UpdateForm {
        id: id.to_string(),
        updates,
    }))?;
    Ok(format_record_line(&find_record(coordinator, id)?) + "\n")
}

pub fn cmd_set_field(coordinator: &mut Coordinator, id: &str, index: usize, value: &str) -> CmdResult {
    let record = find_record(coordinator, id)?;
    let mut fields = record.fields;
    let count = fields.len();
    let field = fields
        .get_mut(index)
        .ok_or_else(|| format!("Form {} has {} fields, no field {}", id, count, index))?;

    field.value = if field.is_toggle() {
        let checked = parse_toggle(value).ok_or_else(|| {
            format!("Expected on/off for a {} field, got \"{}\"", field.field_type, value)
        })?;
        FieldValue::Bool(checked)
    } else {
        FieldValue::from(value)
    };
    let label = field.label.clone();

    expect_stored(coordinator.handle(Message::UpdateForm {
        id: id.to_string(),
        updates: RecordUpdate {
            fields: Some(fields),
            ..Default::default()
        },
    }))?;
    Ok(format!("Updated \"{}\" in {}\n", label, id))
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" | "checked" => Some(true),
        "false" | "off" | "no" | "0" | "unchecked" => Some(false),
        _ => None,
    }
}

// ============================================================================
// fill subcommand
// ============================================================================

#[derive(Serialize)]
struct FrameMutations {
    frame: usize,
    ops: Vec<Mutation>,
}

pub fn cmd_fill(
    coordinator: &mut Coordinator,
    source: &PageSource,
    frame: usize,
    id: Option<&str>,
    output: Option<&str>,
    trace: Option<&str>,
    timing: &TimingConfig,
    driver: &DriverConfig,
) -> CmdResult {
    let tracer_for = |page_url: String| match trace {
        Some(path) => TraceLogger::new(path).for_page(&page_url),
        None => TraceLogger::disabled(),
    };

    if let Some(url) = &source.url {
        let mut session = DriverSession::launch(driver)?;
        session.navigate(url)?;
        let mut page = LivePage::attach(session, FrameId(frame))?;
        let tracer = tracer_for(page.url());
        let text = fill_page(coordinator, &mut page, id, timing, &mut SystemClock::new(), &tracer)?;
        page.commit()?;
        page.into_driver().quit()?;
        return Ok(text);
    }

    // A snapshot never changes, so virtual time is enough.
    let snapshot = read_page(source, driver)?;
    let mut page = TabPage::new(snapshot.into_tab()?, FrameId(frame));
    if page.tab.frame(page.frame).is_none() {
        return Err(AutofillError::NothingCaptured(format!("page has no frame {}", frame)).into());
    }
    let tracer = tracer_for(page.url());
    let text = fill_page(coordinator, &mut page, id, timing, &mut ManualClock::new(), &tracer)?;

    if let Some(path) = output {
        let journals: Vec<FrameMutations> = page
            .tab
            .take_journals()
            .into_iter()
            .map(|(frame, ops)| FrameMutations { frame: frame.0, ops })
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&journals)?)?;
    }
    Ok(text)
}

/// Fill one saved form now, or run an unattended session with every form
/// saved for this page.
pub fn fill_page(
    coordinator: &mut Coordinator,
    page: &mut dyn PageContext,
    id: Option<&str>,
    timing: &TimingConfig,
    clock: &mut dyn Clock,
    tracer: &TraceLogger,
) -> CmdResult {
    if let Some(id) = id {
        let record = find_record(coordinator, id)?;
        let frame = page.frame();
        let reply = page.tab_mut().send(
            frame,
            &Message::FillForm { fields: record.fields },
            Duration::from_millis(timing.relay_timeout_ms),
        )?;
        return match reply {
            Reply::Fill(result) => Ok(format!("Filled {} fields from \"{}\"\n", result.filled, record.title)),
            other => Err(format!("Unexpected reply: {:?}", other).into()),
        };
    }

    let url_pattern = normalize_url(&page.url());
    let records = expect_records(coordinator.handle(Message::GetFormsForUrl { url_pattern }))?;
    let report = run_session(records, *timing, page, coordinator, clock, tracer);
    Ok(format_session_report(&report))
}

// ============================================================================
// delete / export / import
// ============================================================================

pub fn cmd_delete(coordinator: &mut Coordinator, id: &str) -> CmdResult {
    expect_stored(coordinator.handle(Message::DeleteForm { id: id.to_string() }))?;
    Ok(format!("Deleted {}\n", id))
}

pub fn cmd_delete_all(coordinator: &mut Coordinator, yes: bool) -> CmdResult {
    let count = expect_records(coordinator.handle(Message::GetAllForms))?.len();
    if count == 0 {
        return Ok("No forms to delete.\n".to_string());
    }
    if !yes {
        return Err(format!("This would permanently delete {} saved forms; pass --yes to confirm", count).into());
    }
    expect_stored(coordinator.handle(Message::DeleteAllForms))?;
    Ok(format!("Deleted {} forms\n", count))
}

pub fn cmd_export(coordinator: &mut Coordinator, output: Option<&str>) -> CmdResult {
    let json = export_records(coordinator.store())?;
    let count = coordinator.store().get_all()?.len();
    let path = output
        .map(str::to_string)
        .unwrap_or_else(|| backup_file_name(now_ms()));
    std::fs::write(&path, json)?;
    Ok(format!("Exported {} forms to {}\n", count, path))
}

pub fn cmd_import(coordinator: &mut Coordinator, file: &str) -> CmdResult {
    let text = std::fs::read_to_string(file)?;
    let count = import_records(coordinator.store_mut(), &text)?;
    let noun = if count == 1 { "form" } else { "forms" };
    Ok(format!("Imported {} {}\n", count, noun))
}
