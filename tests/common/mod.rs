#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// A cell written into a generated workbook.
#[derive(Debug, Clone, Copy)]
pub enum SheetCell {
    Text(&'static str),
    Number(f64),
    /// Serial day number stored with a built-in date-time format.
    Date(f64),
    Blank,
}

pub struct Sheet {
    pub name: &'static str,
    pub rows: Vec<Vec<SheetCell>>,
}

/// Scratch directory holding a source file, a SQLite database and a config.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("target.sqlite")
    }

    /// Creates the destination database with `ddl` and returns its path.
    pub fn create_database(&self, ddl: &str) -> PathBuf {
        let path = self.database();
        let conn = Connection::open(&path).expect("open sqlite");
        conn.execute_batch(ddl).expect("apply ddl");
        path
    }

    /// Writes an import config pointing at the workspace database.
    pub fn write_config(&self, table: &str, extra: &str) -> PathBuf {
        let yaml = format!("database: target.sqlite\ntable: {table}\n{extra}");
        self.write("import.yaml", &yaml)
    }

    /// Writes a minimal xlsx workbook with `sheets` in order.
    pub fn write_workbook(&self, name: &str, sheets: &[Sheet], date1904: bool) -> PathBuf {
        let path = self.path().join(name);
        let file = File::create(&path).expect("create workbook");
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut parts = vec![
            ("[Content_Types].xml".to_string(), content_types(sheets.len())),
            ("_rels/.rels".to_string(), ROOT_RELS.to_string()),
            ("xl/workbook.xml".to_string(), workbook_xml(sheets, date1904)),
            ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels(sheets.len())),
            ("xl/styles.xml".to_string(), STYLES.to_string()),
        ];
        for (idx, sheet) in sheets.iter().enumerate() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", idx + 1),
                worksheet_xml(&sheet.rows),
            ));
        }
        for (part, contents) in parts {
            zip.start_file(part, options).expect("start zip entry");
            zip.write_all(contents.as_bytes()).expect("write zip entry");
        }
        zip.finish().expect("finish workbook");
        path
    }

    /// All rows of `table` ordered by rowid, NULLs rendered as `NULL`.
    pub fn table_rows(&self, table: &str) -> Vec<Vec<String>> {
        let conn = Connection::open(self.database()).expect("open sqlite");
        let mut statement = conn
            .prepare(&format!("SELECT * FROM \"{table}\" ORDER BY rowid"))
            .expect("prepare select");
        let width = statement.column_count();
        statement
            .query_map([], |row| {
                (0..width)
                    .map(|idx| {
                        let value: rusqlite::types::Value = row.get(idx)?;
                        Ok(match value {
                            rusqlite::types::Value::Null => "NULL".to_string(),
                            rusqlite::types::Value::Integer(i) => i.to_string(),
                            rusqlite::types::Value::Real(f) => f.to_string(),
                            rusqlite::types::Value::Text(s) => s,
                            rusqlite::types::Value::Blob(_) => "<blob>".to_string(),
                        })
                    })
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .expect("query rows")
            .collect::<rusqlite::Result<Vec<_>>>()
            .expect("collect rows")
    }
}

pub const PEOPLE_DDL: &str =
    "CREATE TABLE people (id INTEGER, name TEXT NOT NULL DEFAULT 'unknown', joined DATETIME);";

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

// Style 1 uses built-in number format 22 (m/d/yy h:mm), which readers treat as a date.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font/></fonts><fills count="1"><fill/></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" xfId="0"/><xf numFmtId="22" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

fn content_types(sheets: usize) -> String {
    let overrides = (1..=sheets)
        .map(|idx| {
            format!(
                r#"<Override PartName="/xl/worksheets/sheet{idx}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            )
        })
        .collect::<String>();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>{overrides}</Types>"#
    )
}

fn workbook_xml(sheets: &[Sheet], date1904: bool) -> String {
    let entries = sheets
        .iter()
        .enumerate()
        .map(|(idx, sheet)| {
            format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                sheet.name,
                idx + 1,
                idx + 1
            )
        })
        .collect::<String>();
    let pr = if date1904 { r#"<workbookPr date1904="1"/>"# } else { "<workbookPr/>" };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">{pr}<sheets>{entries}</sheets></workbook>"#
    )
}

fn workbook_rels(sheets: usize) -> String {
    let mut rels = (1..=sheets)
        .map(|idx| {
            format!(
                r#"<Relationship Id="rId{idx}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{idx}.xml"/>"#
            )
        })
        .collect::<String>();
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="{REL_NS}/styles" Target="styles.xml"/>"#,
        sheets + 1
    ));
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
    )
}

fn worksheet_xml(rows: &[Vec<SheetCell>]) -> String {
    let mut data = String::new();
    for (r, row) in rows.iter().enumerate() {
        let row_number = r + 1;
        data.push_str(&format!(r#"<row r="{row_number}">"#));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{row_number}", column_letter(c));
            match cell {
                SheetCell::Text(text) => data.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#
                )),
                SheetCell::Number(value) => {
                    data.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#))
                }
                SheetCell::Date(serial) => {
                    data.push_str(&format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#))
                }
                SheetCell::Blank => {}
            }
        }
        data.push_str("</row>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{MAIN_NS}"><sheetData>{data}</sheetData></worksheet>"#
    )
}

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}
