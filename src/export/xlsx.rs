use anyhow::Result;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{Seek, Write};

use super::ooxml::{self, escape, Package, XML_DECL};
use crate::assemble::AssembledContent;

const SHEET_NAME_MAX: usize = 31;
const CELL_TEXT_MAX: usize = 32_767;
const INVALID_SHEET_CHARS: [char; 7] = ['/', '\\', '?', '*', '[', ']', ':'];

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const DOC_RELS_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const PROJECT_SHEET: &str = "Project Info";
pub const EXTRACTED_BANNER: &str = "EXTRACTED SUBMITTALS";

/// Strip characters spreadsheet applications reject in sheet names and cut
/// the result to 31 characters.
pub fn sanitize_sheet_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !INVALID_SHEET_CHARS.contains(c))
        .take(SHEET_NAME_MAX)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    /// One cell per row, column A.
    pub rows: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    taken: HashSet<String>,
}

impl Workbook {
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Add a sheet under a sanitized, workbook-unique name.
    pub fn add_sheet(&mut self, title: &str, rows: Vec<String>) -> &Sheet {
        let base = sanitize_sheet_title(title).trim_matches('\'').to_string();
        let base = if base.trim().is_empty() { "Sheet".to_string() } else { base };

        let mut name = base.clone();
        let mut n = 2;
        while self.taken.contains(&name.to_lowercase()) {
            let suffix = format!(" ({})", n);
            let keep = SHEET_NAME_MAX - suffix.chars().count();
            name = base.chars().take(keep).collect::<String>() + &suffix;
            n += 1;
        }
        self.taken.insert(name.to_lowercase());
        self.sheets.push(Sheet { name, rows });
        &self.sheets[self.sheets.len() - 1]
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut package = Package::new(writer);
        package.add("[Content_Types].xml", &self.content_types())?;
        package.add("_rels/.rels", &ooxml::root_relationships("xl/workbook.xml"))?;
        package.add("xl/workbook.xml", &self.workbook_xml())?;
        package.add("xl/_rels/workbook.xml.rels", &self.workbook_rels())?;
        package.add("xl/styles.xml", STYLES_XML)?;
        for (i, sheet) in self.sheets.iter().enumerate() {
            package.add(&format!("xl/worksheets/sheet{}.xml", i + 1), &sheet_xml(sheet))?;
        }
        package.finish()
    }

    fn content_types(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
        );
        for i in 1..=self.sheets.len() {
            let _ = write!(
                xml,
                r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            );
        }
        xml.push_str("</Types>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = format!(r#"{XML_DECL}<workbook xmlns="{MAIN_NS}" xmlns:r="{DOC_RELS_NS}"><sheets>"#);
        for (i, sheet) in self.sheets.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape(&sheet.name),
                i + 1,
                i + 1
            );
        }
        xml.push_str("</sheets></workbook>");
        xml
    }

    fn workbook_rels(&self) -> String {
        let mut xml = format!(r#"{XML_DECL}<Relationships xmlns="{}">"#, ooxml::RELS_NS);
        for i in 1..=self.sheets.len() {
            let _ = write!(
                xml,
                r#"<Relationship Id="rId{i}" Type="{DOC_RELS_NS}/worksheet" Target="worksheets/sheet{i}.xml"/>"#
            );
        }
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{DOC_RELS_NS}/styles" Target="styles.xml"/></Relationships>"#,
            self.sheets.len() + 1
        );
        xml
    }
}

fn sheet_xml(sheet: &Sheet) -> String {
    let mut xml = format!(r#"{XML_DECL}<worksheet xmlns="{MAIN_NS}"><sheetData>"#);
    for (i, value) in sheet.rows.iter().enumerate() {
        let row = i + 1;
        if value.is_empty() {
            let _ = write!(xml, r#"<row r="{row}"/>"#);
            continue;
        }
        let value: String = value.chars().take(CELL_TEXT_MAX).collect();
        let _ = write!(
            xml,
            r#"<row r="{row}"><c r="A{row}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c></row>"#,
            escape(&value)
        );
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Project sheet first, then one sheet per section: the caption in A1 and
/// one body line per row below it.
pub fn build_workbook(project_name: &str, content: &AssembledContent) -> Workbook {
    let mut workbook = Workbook::default();
    workbook.add_sheet(
        PROJECT_SHEET,
        vec![project_name.to_string(), EXTRACTED_BANNER.to_string()],
    );
    for section in &content.sections {
        let caption = section.caption();
        let mut rows = vec![caption.clone()];
        rows.extend(section.body.lines().map(str::to_string));
        workbook.add_sheet(&caption, rows);
    }
    workbook
}

const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::AssembledSection;
    use std::io::{Cursor, Read};

    fn section(n: usize) -> AssembledSection {
        AssembledSection {
            heading: format!("SECTION 0{} 00 00", n),
            title: "DOORS / FRAMES [HOLLOW METAL]".to_string(),
            body: "1.1 SUBMITTALS\nA. Product data.".to_string(),
        }
    }

    #[test]
    fn sanitizes_illegal_characters_and_length() {
        let name = sanitize_sheet_title("SECTION 08 11 13 - DOORS/FRAMES \\ [A*B?] : hollow metal");
        assert!(name.chars().count() <= 31);
        assert!(!name.contains(&['/', '\\', '?', '*', '[', ']'][..]));
        assert_eq!(name, "SECTION 08 11 13 - DOORSFRAMES ");
    }

    #[test]
    fn one_sheet_per_section_plus_project_sheet() {
        let content = AssembledContent { sections: (1..=3).map(section).collect() };
        let workbook = build_workbook("Bridge", &content);
        assert_eq!(workbook.sheets().len(), content.len() + 1);
        assert_eq!(workbook.sheets()[0].rows, vec!["Bridge", EXTRACTED_BANNER]);
        assert_eq!(
            workbook.sheets()[1].rows,
            vec!["SECTION 01 00 00 - DOORS / FRAMES [HOLLOW METAL]", "1.1 SUBMITTALS", "A. Product data."]
        );

        let bytes = workbook.write_to(Cursor::new(Vec::new())).unwrap().into_inner();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive.by_name("xl/workbook.xml").unwrap().read_to_string(&mut xml).unwrap();
        assert_eq!(xml.matches("<sheet ").count(), 4);
        assert!(archive.by_name("xl/worksheets/sheet4.xml").is_ok());
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let mut workbook = Workbook::default();
        let long = "SECTION 01 33 00 - SUBMITTAL PROCEDURES";
        workbook.add_sheet(long, vec![]);
        workbook.add_sheet(long, vec![]);
        workbook.add_sheet("section 01 33 00 - submittal pr", vec![]);
        let names: Vec<&str> = workbook.sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "SECTION 01 33 00 - SUBMITTAL PR",
                "SECTION 01 33 00 - SUBMITTA (2)",
                "section 01 33 00 - submitta (3)",
            ]
        );
        assert!(names.iter().all(|n| n.chars().count() <= 31));
    }
}
