//! XML DataSet files: a root element holding an inline `xs:schema`
//! followed by one element per row, each named after its table.
//!
//! The inline schema is kept as raw text so that writing the file back
//! reproduces it exactly; only the row data is re-serialized.

use crate::error::{DbImagesError, Result};
use crate::source::{
    source_name, CellValue, ColumnKind, RoundTripSource, SourceAdapter, SourceShape, Table,
    TabularSource,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use std::fs;
use std::path::Path;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" standalone=\"yes\"?>";

pub struct XmlDataSetAdapter {
    extensions: Vec<String>,
}

impl XmlDataSetAdapter {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl SourceAdapter for XmlDataSetAdapter {
    fn format_name(&self) -> &'static str {
        "XML DataSet"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn load(&self, path: &Path) -> Result<TabularSource> {
        XmlDataSet::load(path).map(XmlDataSet::into_source)
    }
}

#[derive(Debug, Clone)]
pub struct XmlDataSet {
    root_name: String,
    root_attributes: Vec<(String, String)>,
    schema: Option<String>,
    source: TabularSource,
}

impl XmlDataSet {
    /// Wraps an in-memory source; a schema is generated when serializing.
    pub fn new<S: Into<String>>(root_name: S, source: TabularSource) -> Self {
        Self {
            root_name: root_name.into(),
            root_attributes: Vec::new(),
            schema: None,
            source,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DbImagesError::source_unavailable(path, "file not found"));
        }

        let content =
            fs::read_to_string(path).map_err(|e| DbImagesError::source_unavailable(path, e))?;

        let dataset = Self::parse(&source_name(path), &content)
            .map_err(|e| DbImagesError::source_unavailable(path, e))?;

        tracing::debug!(
            path = %path.display(),
            tables = dataset.source.tables().len(),
            inline_schema = dataset.schema.is_some(),
            "loaded xml dataset"
        );
        Ok(dataset)
    }

    pub fn parse(name: &str, content: &str) -> Result<Self> {
        // Reader positions do not count a byte order mark.
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut reader = Reader::from_str(content);
        let mut source = TabularSource::new(name, SourceShape::SchemaTyped);
        let mut root_name: Option<String> = None;
        let mut root_attributes = Vec::new();
        let mut schema: Option<String> = None;

        loop {
            let before = reader.buffer_position();
            match reader.read_event()? {
                Event::Start(e) => {
                    if root_name.is_none() {
                        root_name = Some(qname_to_string(e.name()));
                        root_attributes = raw_attributes(&e)?;
                        continue;
                    }

                    if e.local_name().as_ref() == b"schema" && schema.is_none() && source.is_empty()
                    {
                        let end = e.to_end().into_owned();
                        reader.read_to_end(end.name())?;
                        let raw = &content[before..reader.buffer_position()];
                        for table in parse_schema(raw)? {
                            source.add_table(table)?;
                        }
                        schema = Some(raw.trim().to_string());
                    } else {
                        let table_name = decode_name(&qname_to_string(e.name()));
                        read_row(&mut reader, &mut source, &table_name, schema.is_some())?;
                    }
                }
                Event::Empty(e) => {
                    if root_name.is_none() {
                        root_name = Some(qname_to_string(e.name()));
                        root_attributes = raw_attributes(&e)?;
                        break;
                    }
                    let table_name = decode_name(&qname_to_string(e.name()));
                    if let Some(table) = row_table(&mut source, &table_name, schema.is_some())? {
                        table.push_row(Vec::new());
                    }
                }
                Event::End(_) | Event::Eof => break,
                _ => {}
            }
        }

        let root_name = root_name.ok_or_else(|| DbImagesError::InvalidPath {
            path: format!("{}: document has no root element", name),
        })?;

        Ok(Self {
            root_name,
            root_attributes,
            schema,
            source,
        })
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Attributes of the root element as written, namespace declarations included.
    pub fn root_attributes(&self) -> &[(String, String)] {
        &self.root_attributes
    }

    pub fn inline_schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn into_source(self) -> TabularSource {
        self.source
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        out.push_str(XML_DECLARATION);
        out.push('\n');
        out.push('<');
        out.push_str(&self.root_name);
        for (key, value) in &self.root_attributes {
            out.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
        out.push_str(">\n");

        match self.schema {
            Some(ref raw) => {
                out.push_str("  ");
                out.push_str(raw);
                out.push('\n');
            }
            None => out.push_str(&render_schema(&self.root_name, &self.source)),
        }

        for table in self.source.tables() {
            for row in &table.rows {
                write_row(&mut out, table, row);
            }
        }

        out.push_str(&format!("</{}>\n", self.root_name));
        out
    }
}

impl RoundTripSource for XmlDataSet {
    fn source(&self) -> &TabularSource {
        &self.source
    }

    fn source_mut(&mut self) -> &mut TabularSource {
        &mut self.source
    }

    fn serialize(&self) -> Result<String> {
        Ok(self.to_xml_string())
    }
}

fn qname_to_string(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.as_ref()).to_string()
}

fn raw_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        attributes.push((
            qname_to_string(attr.key),
            attr.unescape_value()?.to_string(),
        ));
    }
    Ok(attributes)
}

/// Decodes `_xHHHH_` and `_xHHHHHHHH_` escapes in an XML element name.
fn decode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 2..];
        match escaped_char(tail) {
            Some((c, digits)) => {
                out.push(c);
                rest = &tail[digits + 1..];
            }
            None => {
                out.push_str("_x");
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// The character and hex digit count of an escape body such as `0020_`.
fn escaped_char(tail: &str) -> Option<(char, usize)> {
    [4, 8].into_iter().find_map(|digits| {
        let hex = tail.get(..digits)?;
        let terminated = tail.as_bytes().get(digits) == Some(&b'_');
        if !terminated || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let c = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)?;
        Some((c, digits))
    })
}

/// Encodes a table or column name so it can be used as an XML element name.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());

    for (i, c) in name.char_indices() {
        let valid = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
        };
        // A literal underscore is escaped only where it would start an escape.
        let starts_escape = c == '_'
            && name[i + 1..]
                .strip_prefix('x')
                .is_some_and(|tail| escaped_char(tail).is_some());

        if valid && !starts_escape {
            out.push(c);
        } else if (c as u32) > 0xFFFF {
            out.push_str(&format!("_x{:08X}_", c as u32));
        } else {
            out.push_str(&format!("_x{:04X}_", c as u32));
        }
    }

    out
}

/// Table that receives a row element, created on demand for schema-less files.
fn row_table<'s>(
    source: &'s mut TabularSource,
    name: &str,
    has_schema: bool,
) -> Result<Option<&'s mut Table>> {
    if source.table_index(name).is_none() {
        if has_schema {
            tracing::warn!(element = %name, "ignoring element not declared in schema");
            return Ok(None);
        }
        source.add_table(Table::new(name))?;
    }
    Ok(source.table_mut(name))
}

fn read_row(
    reader: &mut Reader<&[u8]>,
    source: &mut TabularSource,
    table_name: &str,
    has_schema: bool,
) -> Result<()> {
    let mut cells: Vec<(String, String)> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let column = decode_name(&qname_to_string(e.name()));
                let end = e.to_end().into_owned();
                let text = read_text(reader, end.name())?;
                cells.push((column, text));
            }
            Event::Empty(e) => {
                cells.push((decode_name(&qname_to_string(e.name())), String::new()));
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(DbImagesError::InvalidPath {
                    path: format!("unexpected end of document inside row of '{}'", table_name),
                })
            }
            _ => {}
        }
    }

    let table = match row_table(source, table_name, has_schema)? {
        Some(table) => table,
        None => return Ok(()),
    };

    let mut row = vec![CellValue::Null; table.columns.len()];
    for (column, text) in cells {
        let index = match table.column_index(&column) {
            Some(index) => index,
            None if has_schema => {
                tracing::warn!(table = %table.name, column = %column, "ignoring undeclared column");
                continue;
            }
            None => {
                row.push(CellValue::Null);
                table.add_column(column, Some(ColumnKind::Text))
            }
        };
        row[index] = parse_cell(table.columns[index].kind, text)?;
    }
    table.push_row(row);

    Ok(())
}

/// Collects the text content of the current element, including nested text.
fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String> {
    let mut text = String::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::Start(_) => depth += 1,
            Event::End(e) if depth == 0 && e.name() == end => break,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => {
                return Err(DbImagesError::InvalidPath {
                    path: format!("unterminated element <{}>", qname_to_string(end)),
                })
            }
            _ => {}
        }
    }

    Ok(text)
}

fn parse_cell(kind: Option<ColumnKind>, text: String) -> Result<CellValue> {
    Ok(match kind {
        Some(ColumnKind::Binary) => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            CellValue::Bytes(STANDARD.decode(compact)?)
        }
        Some(ColumnKind::Other) => CellValue::Other(text),
        Some(ColumnKind::Text) | None => CellValue::Text(text),
    })
}

fn parse_schema(raw: &str) -> Result<Vec<Table>> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);

    let mut tables: Vec<Table> = Vec::new();
    let mut open: Vec<Vec<u8>> = Vec::new();
    // The last column was declared without a type and may get one from a restriction.
    let mut awaiting_base = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                schema_element(&e, &open, &mut tables, &mut awaiting_base)?;
                open.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => schema_element(&e, &open, &mut tables, &mut awaiting_base)?,
            Event::End(_) => {
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(tables)
}

fn schema_element(
    e: &BytesStart<'_>,
    open: &[Vec<u8>],
    tables: &mut Vec<Table>,
    awaiting_base: &mut bool,
) -> Result<()> {
    let element_depth = open.iter().filter(|name| name.as_slice() == b"element").count();

    match e.local_name().as_ref() {
        b"element" if element_depth == 1 => {
            if let Some(name) = attribute(e, "name")? {
                tables.push(Table::new(decode_name(&name)));
            }
        }
        b"element" if element_depth == 2 => {
            let (Some(table), Some(name)) = (tables.last_mut(), attribute(e, "name")?) else {
                return Ok(());
            };
            let type_name = attribute(e, "type")?;
            let data_type = attribute(e, "DataType")?;
            *awaiting_base = type_name.is_none() && data_type.is_none();
            table.add_column(
                decode_name(&name),
                Some(column_kind(type_name.as_deref(), data_type.as_deref())),
            );
        }
        b"restriction" if element_depth == 3 && *awaiting_base => {
            let base = attribute(e, "base")?;
            if let Some(column) = tables.last_mut().and_then(|t| t.columns.last_mut()) {
                column.kind = Some(column_kind(base.as_deref(), None));
            }
            *awaiting_base = false;
        }
        b"attribute" if element_depth == 2 => {
            tracing::warn!("attribute-mapped columns are not supported; ignoring");
        }
        _ => {}
    }

    Ok(())
}

fn attribute(e: &BytesStart<'_>, local: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == local.as_bytes() {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

/// Maps an XSD type and an optional `msdata:DataType` to a column kind.
fn column_kind(xsd_type: Option<&str>, data_type: Option<&str>) -> ColumnKind {
    if let Some(data_type) = data_type {
        return match data_type.split(',').next().map(str::trim) {
            Some("System.Byte[]") => ColumnKind::Binary,
            Some("System.String") => ColumnKind::Text,
            _ => ColumnKind::Other,
        };
    }

    let local = xsd_type.map(|t| t.rsplit(':').next().unwrap_or(t));
    match local {
        Some("base64Binary") => ColumnKind::Binary,
        Some("string") | None => ColumnKind::Text,
        Some(_) => ColumnKind::Other,
    }
}

fn write_row(out: &mut String, table: &Table, row: &[CellValue]) {
    let element = encode_name(&table.name);
    let cells: Vec<(String, String)> = table
        .columns
        .iter()
        .zip(row)
        .filter_map(|(column, value)| {
            let text = match value {
                CellValue::Null => return None,
                CellValue::Bytes(bytes) => STANDARD.encode(bytes),
                CellValue::Text(text) | CellValue::Other(text) => escape(text).to_string(),
            };
            Some((encode_name(&column.name), text))
        })
        .collect();

    if cells.is_empty() {
        out.push_str(&format!("  <{} />\n", element));
        return;
    }

    out.push_str(&format!("  <{}>\n", element));
    for (column, text) in cells {
        out.push_str(&format!("    <{0}>{1}</{0}>\n", column, text));
    }
    out.push_str(&format!("  </{}>\n", element));
}

fn render_schema(root: &str, source: &TabularSource) -> String {
    let root = escape(root);
    let mut out = String::new();

    out.push_str(&format!(
        "  <xs:schema id=\"{0}\" xmlns=\"\" xmlns:xs=\"http://www.w3.org/2001/XMLSchema\" xmlns:msdata=\"urn:schemas-microsoft-com:xml-msdata\">\n",
        root
    ));
    out.push_str(&format!(
        "    <xs:element name=\"{}\" msdata:IsDataSet=\"true\" msdata:UseCurrentLocale=\"true\">\n",
        root
    ));
    out.push_str("      <xs:complexType>\n");
    out.push_str("        <xs:choice minOccurs=\"0\" maxOccurs=\"unbounded\">\n");

    for table in source.tables() {
        out.push_str(&format!("          <xs:element name=\"{}\">\n", encode_name(&table.name)));
        out.push_str("            <xs:complexType>\n");
        out.push_str("              <xs:sequence>\n");
        for column in &table.columns {
            let xsd_type = match column.kind {
                Some(ColumnKind::Binary) => "xs:base64Binary",
                Some(ColumnKind::Other) => "xs:anyType",
                Some(ColumnKind::Text) | None => "xs:string",
            };
            out.push_str(&format!(
                "                <xs:element name=\"{}\" type=\"{}\" minOccurs=\"0\" />\n",
                encode_name(&column.name),
                xsd_type
            ));
        }
        out.push_str("              </xs:sequence>\n");
        out.push_str("            </xs:complexType>\n");
        out.push_str("          </xs:element>\n");
    }

    out.push_str("        </xs:choice>\n");
    out.push_str("      </xs:complexType>\n");
    out.push_str("    </xs:element>\n");
    out.push_str("  </xs:schema>\n");
    out
}
