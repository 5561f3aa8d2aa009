//! Result rendering: paginated terminal output, clipboard text and the
//! plain-text export.

use crate::query::{SearchOutcome, SearchResult, SearchStatus};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Number of pages needed for `total` results
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

/// Print one page (1-based) of results to stdout
pub fn print_results(
    outcome: &SearchOutcome,
    term: &str,
    page: usize,
    page_size: usize,
    color: bool,
) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    write_results(&mut stdout, outcome, term, page, page_size)
}

pub fn write_results<W: WriteColor>(
    out: &mut W,
    outcome: &SearchOutcome,
    term: &str,
    page: usize,
    page_size: usize,
) -> io::Result<()> {
    let results = &outcome.results;
    let total = results.len();

    if total == 0 {
        writeln!(out, "По запросу \"{}\" ничего не найдено", term)?;
        write_status(out, outcome.status)?;
        return Ok(());
    }

    let page_size = page_size.max(1);
    let pages = page_count(total, page_size);
    let page = page.clamp(1, pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total);

    for result in &results[start..end] {
        write_result(out, result)?;
    }

    if total > page_size {
        writeln!(out)?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        if page == 1 {
            write!(out, "⚠️ Показаны первые {} из {} результатов", end, total)?;
        } else {
            write!(out, "⚠️ Показаны результаты {}–{} из {}", start + 1, end, total)?;
        }
        out.reset()?;
        if page < pages {
            write!(out, " (страница {}/{}, далее: --page {})", page, pages, page + 1)?;
        }
        writeln!(out)?;
    }

    write_status(out, outcome.status)?;
    Ok(())
}

fn write_status<W: WriteColor>(out: &mut W, status: SearchStatus) -> io::Result<()> {
    let note = match status {
        SearchStatus::Complete => return Ok(()),
        SearchStatus::Truncated => "Показаны первые результаты, поиск остановлен на лимите",
        SearchStatus::Cancelled => "Поиск отменён, показаны найденные до отмены строки",
    };
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    writeln!(out, "{}", note)?;
    out.reset()
}

/// Badge line followed by the content with matches highlighted
fn write_result<W: WriteColor>(out: &mut W, result: &SearchResult) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(out, "Строка #{}", result.line_number)?;
    out.reset()?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    writeln!(out, "  {} вхождений", result.match_count())?;
    out.reset()?;

    let content = &result.content;
    let mut cursor = 0;
    for range in result.match_ranges() {
        if range.start < cursor || range.end > content.len() {
            continue;
        }
        write!(out, "{}", &content[cursor..range.start])?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "{}", &content[range.clone()])?;
        out.reset()?;
        cursor = range.end;
    }
    writeln!(out, "{}", &content[cursor..])?;
    writeln!(out)?;
    Ok(())
}

/// Text for copying results, capped at `limit` lines
pub fn clipboard_text(term: &str, file_name: &str, results: &[SearchResult], limit: usize) -> String {
    let mut text = header(term, file_name, None, results.len());

    let shown = results.len().min(limit);
    for result in &results[..shown] {
        push_line(&mut text, result);
    }

    if results.len() > shown {
        text.push_str(&format!("\n... и еще {} результатов\n", results.len() - shown));
    }
    text
}

/// Full plain-text export of every result
pub fn export_text(
    term: &str,
    file_name: &str,
    results: &[SearchResult],
    exported_at: DateTime<Local>,
) -> String {
    let mut text = header(term, file_name, Some(exported_at), results.len());
    for result in results {
        push_line(&mut text, result);
    }
    text
}

/// Default export file name: `search_results_<name>_<unix millis>.txt`
pub fn export_file_name(file_name: &str, exported_at: DateTime<Local>) -> String {
    format!(
        "search_results_{}_{}.txt",
        file_name,
        exported_at.timestamp_millis()
    )
}

fn header(
    term: &str,
    file_name: &str,
    exported_at: Option<DateTime<Local>>,
    count: usize,
) -> String {
    let mut text = format!("Результаты поиска: \"{}\"\n", term);
    text.push_str(&format!("Файл: {}\n", file_name));
    if let Some(at) = exported_at {
        text.push_str(&format!("Время экспорта: {}\n", at.format("%d.%m.%Y, %H:%M:%S")));
    }
    text.push_str(&format!("Найдено: {} совпадений\n\n", count));
    text
}

fn push_line(text: &mut String, result: &SearchResult) {
    text.push_str(&format!("[Строка {}]: {}\n", result.line_number, result.content));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    file: &'a str,
    search_term: &'a str,
    status: SearchStatus,
    count: usize,
    results: &'a [SearchResult],
}

/// Machine-readable report of a search
pub fn write_json<W: Write>(
    out: &mut W,
    file_name: &str,
    term: &str,
    outcome: &SearchOutcome,
) -> io::Result<()> {
    let report = JsonReport {
        file: file_name,
        search_term: term,
        status: outcome.status,
        count: outcome.results.len(),
        results: &outcome.results,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}
