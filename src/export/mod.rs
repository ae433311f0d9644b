//! Submissions as an `.xlsx` workbook.
//!
//! A minimal SpreadsheetML package: parts written with `quick_xml`, packed
//! with `zip`. One worksheet, inline strings only, a header row of `Date Generated` followed by the
//! template's field labels.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::schema::Submission;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const DATE_HEADER: &str = "Date Generated";
const MISSING: &str = "-";
const SHEET_NAME: &str = "Responses";

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const PACKAGE_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const DOCUMENT_RELS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Could not build the workbook: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Could not write workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Header row plus one row per submission, in the order given.
pub fn response_rows(labels: &[String], submissions: &[Submission]) -> Vec<Vec<String>> {
    let header = std::iter::once(DATE_HEADER.to_string())
        .chain(labels.iter().cloned())
        .collect();

    let rows = submissions.iter().map(|submission| {
        std::iter::once(submission.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
            .chain(labels.iter().map(|label| {
                submission
                    .values
                    .get(label)
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .unwrap_or_else(|| MISSING.to_string())
            }))
            .collect()
    });

    std::iter::once(header).chain(rows).collect()
}

pub fn responses_workbook(
    labels: &[String],
    submissions: &[Submission],
) -> Result<Vec<u8>, ExportError> {
    let rows = response_rows(labels, submissions);
    let parts = [
        ("[Content_Types].xml", content_types_xml()?),
        ("_rels/.rels", root_rels_xml()?),
        ("xl/workbook.xml", workbook_xml()?),
        ("xl/_rels/workbook.xml.rels", workbook_rels_xml()?),
        ("xl/worksheets/sheet1.xml", sheet_xml(&rows)?),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().unix_permissions(0o644);
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(&body)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// One XML part: declaration, then whatever `body` writes.
fn xml_part(
    body: impl FnOnce(&mut XmlWriter) -> Result<(), ExportError>,
) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    body(&mut writer)?;
    Ok(writer.into_inner().into_inner())
}

fn content_types_xml() -> Result<Vec<u8>, ExportError> {
    xml_part(|w| {
        w.write_event(Event::Start(
            BytesStart::new("Types").with_attributes([("xmlns", CONTENT_TYPES_NS)]),
        ))?;
        w.write_event(Event::Empty(BytesStart::new("Default").with_attributes([
            ("Extension", "rels"),
            (
                "ContentType",
                "application/vnd.openxmlformats-package.relationships+xml",
            ),
        ])))?;
        w.write_event(Event::Empty(BytesStart::new("Default").with_attributes([
            ("Extension", "xml"),
            ("ContentType", "application/xml"),
        ])))?;
        w.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
            ("PartName", "/xl/workbook.xml"),
            (
                "ContentType",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
            ),
        ])))?;
        w.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
            ("PartName", "/xl/worksheets/sheet1.xml"),
            (
                "ContentType",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
            ),
        ])))?;
        w.write_event(Event::End(BytesEnd::new("Types")))?;
        Ok(())
    })
}

fn relationships_xml(kind: &str, target: &str) -> Result<Vec<u8>, ExportError> {
    let kind = format!("{}/{}", DOCUMENT_RELS_NS, kind);
    xml_part(|w| {
        w.write_event(Event::Start(
            BytesStart::new("Relationships").with_attributes([("xmlns", PACKAGE_RELS_NS)]),
        ))?;
        w.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
            ("Id", "rId1"),
            ("Type", kind.as_str()),
            ("Target", target),
        ])))?;
        w.write_event(Event::End(BytesEnd::new("Relationships")))?;
        Ok(())
    })
}

fn root_rels_xml() -> Result<Vec<u8>, ExportError> {
    relationships_xml("officeDocument", "xl/workbook.xml")
}

fn workbook_rels_xml() -> Result<Vec<u8>, ExportError> {
    relationships_xml("worksheet", "worksheets/sheet1.xml")
}

fn workbook_xml() -> Result<Vec<u8>, ExportError> {
    xml_part(|w| {
        w.write_event(Event::Start(BytesStart::new("workbook").with_attributes([
            ("xmlns", SPREADSHEET_NS),
            ("xmlns:r", DOCUMENT_RELS_NS),
        ])))?;
        w.write_event(Event::Start(BytesStart::new("sheets")))?;
        w.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
            ("name", SHEET_NAME),
            ("sheetId", "1"),
            ("r:id", "rId1"),
        ])))?;
        w.write_event(Event::End(BytesEnd::new("sheets")))?;
        w.write_event(Event::End(BytesEnd::new("workbook")))?;
        Ok(())
    })
}

fn sheet_xml(rows: &[Vec<String>]) -> Result<Vec<u8>, ExportError> {
    xml_part(|w| {
        w.write_event(Event::Start(
            BytesStart::new("worksheet").with_attributes([("xmlns", SPREADSHEET_NS)]),
        ))?;
        w.write_event(Event::Start(BytesStart::new("sheetData")))?;
        for (r, row) in rows.iter().enumerate() {
            let row_number = (r + 1).to_string();
            w.write_event(Event::Start(
                BytesStart::new("row").with_attributes([("r", row_number.as_str())]),
            ))?;
            for (c, value) in row.iter().enumerate() {
                write_cell(w, &format!("{}{}", column_name(c), row_number), value)?;
            }
            w.write_event(Event::End(BytesEnd::new("row")))?;
        }
        w.write_event(Event::End(BytesEnd::new("sheetData")))?;
        w.write_event(Event::End(BytesEnd::new("worksheet")))?;
        Ok(())
    })
}

/// An inline-string cell. Control characters are not allowed in XML 1.0,
/// so they are dropped; the writer escapes the rest.
fn write_cell(w: &mut XmlWriter, cell_ref: &str, value: &str) -> Result<(), ExportError> {
    let text: String = value
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    w.write_event(Event::Start(
        BytesStart::new("c").with_attributes([("r", cell_ref), ("t", "inlineStr")]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("is")))?;
    w.write_event(Event::Start(
        BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
    ))?;
    w.write_event(Event::Text(BytesText::new(&text)))?;
    w.write_event(Event::End(BytesEnd::new("t")))?;
    w.write_event(Event::End(BytesEnd::new("is")))?;
    w.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Spreadsheet column letters for a zero-based index: 0 → A, 26 → AA.
fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use uuid::Uuid;

    fn submission(pairs: &[(&str, &str)]) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap(),
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_rows_have_headers_and_placeholders() {
        let labels = vec!["Name".to_string(), "Email".to_string()];
        let rows = response_rows(
            &labels,
            &[submission(&[("Name", "Jane"), ("Email", "")]), submission(&[("Email", "a@b.co")])],
        );
        assert_eq!(
            rows,
            vec![
                vec!["Date Generated", "Name", "Email"],
                vec!["2024-03-15 09:30:00", "Jane", "-"],
                vec!["2024-03-15 09:30:00", "-", "a@b.co"],
            ]
        );
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    fn sheet_text(rows: &[Vec<String>]) -> String {
        String::from_utf8(sheet_xml(rows).unwrap()).unwrap()
    }

    #[test]
    fn test_cell_values_are_escaped() {
        let sheet = sheet_text(&[vec!["Tom & \"Jerry\" <3".to_string(), "a\u{1}b".to_string()]]);
        assert!(sheet.contains("Tom &amp; &quot;Jerry&quot; &lt;3"));
        assert!(sheet.contains(r#"<c r="B1" t="inlineStr"><is><t xml:space="preserve">ab</t>"#));
    }

    #[test]
    fn test_fixed_parts_name_the_sheet() {
        let workbook = String::from_utf8(workbook_xml().unwrap()).unwrap();
        assert!(workbook.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(workbook.contains(r#"<sheet name="Responses" sheetId="1" r:id="rId1"/>"#));

        let rels = String::from_utf8(workbook_rels_xml().unwrap()).unwrap();
        assert!(rels.contains(r#"Target="worksheets/sheet1.xml""#));
    }

    #[test]
    fn test_workbook_is_a_zip_with_the_sheet() {
        let labels = vec!["Name".to_string()];
        let bytes = responses_workbook(&labels, &[submission(&[("Name", "Jane & Co")])]).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains(r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve">Date Generated</t>"#));
        assert!(sheet.contains("Jane &amp; Co"));
        assert!(sheet.contains(r#"<row r="2">"#));
    }
}
