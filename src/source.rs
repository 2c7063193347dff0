use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::SurveyError;
use crate::models::{RawCell, RawRecord, RawTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Csv,
    Workbook,
}

impl SourceFormat {
    /// Anything that is not `.csv` is read as a workbook.
    pub fn from_filename(name: &str) -> Self {
        if name.trim().to_lowercase().ends_with(".csv") {
            SourceFormat::Csv
        } else {
            SourceFormat::Workbook
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Workbook => "workbook",
        }
    }
}

/// Raw bytes plus the filename they came from.
#[derive(Debug, Clone)]
pub struct SourceBytes {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceBytes {
    pub fn format(&self) -> SourceFormat {
        SourceFormat::from_filename(&self.name)
    }
}

pub fn read_file(path: &Path) -> anyhow::Result<SourceBytes> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceBytes { name, bytes })
}

pub fn decode(bytes: &[u8], format: SourceFormat) -> Result<RawTable, SurveyError> {
    if bytes.is_empty() {
        return Err(SurveyError::EmptySource);
    }

    match format {
        SourceFormat::Csv => decode_csv(bytes),
        SourceFormat::Workbook => decode_workbook(bytes),
    }
}

fn unreadable(format: SourceFormat, reason: impl ToString) -> SurveyError {
    SurveyError::SourceUnreadable {
        format: format.label().to_string(),
        reason: reason.to_string(),
    }
}

fn decode_csv(bytes: &[u8]) -> Result<RawTable, SurveyError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(SourceFormat::Csv, e))?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| unreadable(SourceFormat::Csv, e))?;
        rows.push(RawRecord::new(record.iter().map(RawCell::from_text).collect()));
    }

    Ok(RawTable { headers, rows })
}

fn decode_workbook(bytes: &[u8]) -> Result<RawTable, SurveyError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| unreadable(SourceFormat::Workbook, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| unreadable(SourceFormat::Workbook, "workbook has no sheets"))?
        .map_err(|e| unreadable(SourceFormat::Workbook, e))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell_to_raw(cell).as_text().unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };

    let rows = rows
        .map(|row| RawRecord::new(row.iter().map(cell_to_raw).collect()))
        .collect();

    Ok(RawTable { headers, rows })
}

fn cell_to_raw(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::from_text(s),
        Data::Int(n) => RawCell::Number(*n as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        // `as_datetime` honors the workbook's 1900 or 1904 date system.
        Data::DateTime(dt) if dt.is_datetime() => dt
            .as_datetime()
            .map(RawCell::DateTime)
            .unwrap_or(RawCell::Empty),
        Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::HeaderAliasTable;
    use crate::normalize::normalize;
    use calamine::{CellErrorType, ExcelDateTime, ExcelDateTimeType};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::io::Write;

    #[test]
    fn format_follows_filename_hint() {
        assert_eq!(SourceFormat::from_filename("opd.CSV"), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_filename("mpxo.xlsx"), SourceFormat::Workbook);
        assert_eq!(SourceFormat::from_filename("export"), SourceFormat::Workbook);
    }

    #[test]
    fn empty_buffer_is_its_own_error() {
        assert!(matches!(
            decode(&[], SourceFormat::Csv),
            Err(SurveyError::EmptySource)
        ));
    }

    #[test]
    fn csv_keeps_headers_and_pads_ragged_rows() {
        let bytes = "\u{feff}ประทับเวลา,หน่วยงาน,เพศ\n15/03/2024 10:00,OPD อายุรกรรม\n"
            .as_bytes();
        let table = decode(bytes, SourceFormat::Csv).unwrap();

        assert_eq!(table.headers, vec!["ประทับเวลา", "หน่วยงาน", "เพศ"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(
            table.rows[0].cell(1),
            &RawCell::Text("OPD อายุรกรรม".to_string())
        );
        assert_eq!(table.rows[0].cell(2), &RawCell::Empty);
    }

    #[test]
    fn csv_blank_cells_are_empty() {
        let table = decode(b"a,b\n  ,x\n", SourceFormat::Csv).unwrap();
        assert_eq!(table.rows[0].cell(0), &RawCell::Empty);
    }

    #[test]
    fn invalid_utf8_csv_is_unreadable() {
        let err = decode(&[0xff, 0xfe, 0x00, 0x41, b'\n'], SourceFormat::Csv).unwrap_err();
        assert!(matches!(err, SurveyError::SourceUnreadable { format, .. } if format == "csv"));
    }

    #[test]
    fn garbage_workbook_is_unreadable() {
        let err = decode(b"not a spreadsheet", SourceFormat::Workbook).unwrap_err();
        assert!(matches!(err, SurveyError::SourceUnreadable { format, .. } if format == "workbook"));
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn workbook_cells_map_to_raw_cells() {
        assert_eq!(cell_to_raw(&Data::Empty), RawCell::Empty);
        assert_eq!(cell_to_raw(&Data::Error(CellErrorType::Div0)), RawCell::Empty);
        assert_eq!(cell_to_raw(&Data::Int(4)), RawCell::Number(4.0));
        assert_eq!(cell_to_raw(&Data::Float(4.5)), RawCell::Number(4.5));
        assert_eq!(
            cell_to_raw(&Data::String("มาก".into())),
            RawCell::Text("มาก".into())
        );
        assert_eq!(cell_to_raw(&Data::String("   ".into())), RawCell::Empty);
        assert_eq!(
            cell_to_raw(&Data::DateTimeIso("2024-03-15T12:00:00".into())),
            RawCell::Text("2024-03-15T12:00:00".into())
        );
    }

    #[test]
    fn workbook_dates_honor_both_date_systems() {
        let system_1900 = ExcelDateTime::new(45366.5, ExcelDateTimeType::DateTime, false);
        let system_1904 = ExcelDateTime::new(45366.5 - 1462.0, ExcelDateTimeType::DateTime, true);
        assert_eq!(cell_to_raw(&Data::DateTime(system_1900)), RawCell::DateTime(at(15, 12)));
        assert_eq!(cell_to_raw(&Data::DateTime(system_1904)), RawCell::DateTime(at(15, 12)));

        let duration = ExcelDateTime::new(0.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(cell_to_raw(&Data::DateTime(duration)), RawCell::Number(0.5));
    }

    fn inline(cell: &str, text: &str) -> String {
        format!(r#"<c r="{cell}" t="inlineStr"><is><t>{text}</t></is></c>"#)
    }

    fn sheet(rows: &[String]) -> String {
        let rows: String = rows
            .iter()
            .enumerate()
            .map(|(i, cells)| format!(r#"<row r="{}">{cells}</row>"#, i + 1))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
        )
    }

    /// Minimal two-sheet .xlsx; style 1 is the built-in date-time format.
    fn workbook_bytes(date_1904: bool, serial: f64) -> Vec<u8> {
        let workbook_pr = if date_1904 {
            r#"<workbookPr date1904="1"/>"#
        } else {
            "<workbookPr/>"
        };
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{workbook_pr}<sheets><sheet name="Responses" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets></workbook>"#
        );
        let responses = sheet(&[
            [
                inline("A1", "ประทับเวลา"),
                inline("B1", "หน่วยงาน"),
                inline("C1", "ความพึงพอใจโดยรวม"),
            ]
            .concat(),
            [
                format!(r#"<c r="A2" s="1"><v>{serial}</v></c>"#),
                inline("B2", "OPD"),
                r#"<c r="C2"><v>4</v></c>"#.to_string(),
            ]
            .concat(),
        ]);
        let notes = sheet(&[inline("A1", "หมายเหตุ"), inline("A2", "ไม่ใช่ข้อมูล")]);

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/workbook.xml", workbook),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/styles.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#.to_string(),
            ),
            ("xl/worksheets/sheet1.xml", responses),
            ("xl/worksheets/sheet2.xml", notes),
        ];

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in parts {
            writer.start_file(name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn workbook_reads_header_and_rows_from_first_sheet() {
        let table = decode(&workbook_bytes(false, 45366.5), SourceFormat::Workbook).unwrap();

        assert_eq!(table.headers, vec!["ประทับเวลา", "หน่วยงาน", "ความพึงพอใจโดยรวม"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cell(0), &RawCell::DateTime(at(15, 12)));
        assert_eq!(table.rows[0].cell(1), &RawCell::Text("OPD".into()));
        assert_eq!(table.rows[0].cell(2), &RawCell::Number(4.0));
    }

    #[test]
    fn workbook_in_1904_system_yields_the_same_timestamps() {
        let table =
            decode(&workbook_bytes(true, 45366.5 - 1462.0), SourceFormat::Workbook).unwrap();
        assert_eq!(table.rows[0].cell(0), &RawCell::DateTime(at(15, 12)));

        let normalized = normalize(&table, &HeaderAliasTable::builtin()).unwrap();
        let record = &normalized.records[0];
        assert_eq!((record.year, record.quarter, record.month), (2024, 1, 3));
        assert_eq!(record.overall_satisfaction_score, Some(4));
    }

    #[test]
    fn read_file_uses_file_name_as_hint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Timestamp,หน่วยงาน").unwrap();

        let source = read_file(&path).unwrap();
        assert_eq!(source.name, "upload.csv");
        assert_eq!(source.format(), SourceFormat::Csv);
    }
}
