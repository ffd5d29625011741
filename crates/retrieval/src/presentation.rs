//! Rendering of listings as XML, JSON or a minimal HTML table.

use quick_xml::escape::escape;
use serde::Serialize;
use serde_json::Value;

use seis_common::{PresentationFormat, SeisError, SeisResult};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Serialize)]
struct ResultSet<'a, T> {
    item: &'a [T],
}

/// Render `items` in the requested format. XML wraps them as
/// `<resultset><item>...</item>...</resultset>`.
pub fn render<T: Serialize>(items: &[T], format: PresentationFormat, title: &str) -> SeisResult<String> {
    match format {
        PresentationFormat::Xml => {
            let body = quick_xml::se::to_string_with_root("resultset", &ResultSet { item: items })
                .map_err(|e| SeisError::InternalError(format!("XML serialization failed: {}", e)))?;
            Ok(format!("{}\n{}", XML_DECLARATION, body))
        }
        PresentationFormat::Json => Ok(serde_json::to_string_pretty(items)?),
        PresentationFormat::Html => render_html(items, title),
    }
}

fn render_html<T: Serialize>(items: &[T], title: &str) -> SeisResult<String> {
    let rows: Vec<Value> = items
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;

    let mut columns: Vec<String> = Vec::new();
    for row in &rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>");
    html.push_str(&escape(title));
    html.push_str("</title></head>\n<body>\n<h1>");
    html.push_str(&escape(title));
    html.push_str("</h1>\n<table border=\"1\">\n<tr>");
    for column in &columns {
        html.push_str("<th>");
        html.push_str(&escape(column));
        html.push_str("</th>");
    }
    html.push_str("</tr>\n");

    for row in &rows {
        html.push_str("<tr>");
        for column in &columns {
            html.push_str("<td>");
            if let Some(value) = row.get(column) {
                html.push_str(&escape(&cell_text(value)));
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n</body>\n</html>\n");
    Ok(html)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(values) => values.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
