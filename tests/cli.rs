use assert_cmd::Command;
use dbimages::source::{CellValue, ColumnKind, SourceShape, Table, TabularSource, XmlDataSet};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF: [u8; 6] = *b"GIF89a";

fn dbimages(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dbimages").unwrap();
    cmd.current_dir(cwd);
    cmd
}

fn write_dataset(path: &Path) {
    let mut table = Table::new("Order_Items")
        .with_column("Label", Some(ColumnKind::Text))
        .with_column("Photo", Some(ColumnKind::Binary));
    table.push_row(vec![
        CellValue::Text("first".into()),
        CellValue::Bytes(PNG.to_vec()),
    ]);
    table.push_row(vec![
        CellValue::Text("second".into()),
        CellValue::Bytes(PNG.to_vec()),
    ]);
    table.push_row(vec![CellValue::Text("third".into()), CellValue::Null]);

    let mut source = TabularSource::new("shop.xml", SourceShape::SchemaTyped);
    source.add_table(table).unwrap();
    fs::write(path, XmlDataSet::new("NewDataSet", source).to_xml_string()).unwrap();
}

#[test]
fn update_with_wrong_argument_count_prints_usage() {
    let temp_dir = TempDir::new().unwrap();

    dbimages(temp_dir.path())
        .args(["--update-xml", "shop.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn extract_then_update_xml_dataset() {
    let temp_dir = TempDir::new().unwrap();
    let source_path = temp_dir.path().join("shop.xml");
    write_dataset(&source_path);

    dbimages(temp_dir.path())
        .args([".", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EXTRACTED: shop.xml images=2"));

    let folder = temp_dir.path().join("DB_shop.xml_Images");
    assert_eq!(fs::read(folder.join("Order_Items_Photo_01.png")).unwrap(), PNG);
    assert_eq!(fs::read(folder.join("Order_Items_Photo_02.png")).unwrap(), PNG);

    fs::remove_file(folder.join("Order_Items_Photo_02.png")).unwrap();
    fs::write(folder.join("Order_Items_Photo_02.gif"), GIF).unwrap();
    fs::write(folder.join("Order_Items_Photo_09.png"), PNG).unwrap();

    dbimages(temp_dir.path())
        .args(["--output-format", "plain", "--update-xml", "shop.xml"])
        .arg(&folder)
        .assert()
        .success()
        .stdout(predicate::str::contains("applied=2"))
        .stdout(predicate::str::contains("SKIPPED: Order_Items_Photo_09.png"));

    let source = XmlDataSet::load(&source_path).unwrap().into_source();
    let table = source.table("Order_Items").unwrap();
    assert_eq!(table.cell(0, 1), Some(&CellValue::Bytes(PNG.to_vec())));
    assert_eq!(table.cell(1, 1), Some(&CellValue::Bytes(GIF.to_vec())));
    assert_eq!(table.cell(2, 1), Some(&CellValue::Null));
    assert!(temp_dir.path().join("shop.xml.backup").exists());
    assert!(!temp_dir.path().join("shop.xml.temp").exists());
}

#[test]
fn sqlite_images_use_three_digit_indices() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("album.sqlite3");
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE photos (id INTEGER, data BLOB);")
            .unwrap();
        conn.execute("INSERT INTO photos VALUES (1, ?1)", [PNG.to_vec()])
            .unwrap();
        conn.execute("INSERT INTO photos VALUES (2, ?1)", [GIF.to_vec()])
            .unwrap();
    }

    dbimages(temp_dir.path())
        .args(["-q", "."])
        .assert()
        .success();

    let folder = temp_dir.path().join("DB_album.sqlite3_Images");
    assert_eq!(fs::read(folder.join("photos_data_001.png")).unwrap(), PNG);
    assert_eq!(fs::read(folder.join("photos_data_002.gif")).unwrap(), GIF);
}

#[test]
fn json_output_reports_extraction() {
    let temp_dir = TempDir::new().unwrap();
    write_dataset(&temp_dir.path().join("shop.xml"));

    dbimages(temp_dir.path())
        .args([".", "--output-format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\":\"extraction_report\""))
        .stdout(predicate::str::contains("\"type\":\"summary\""));
}

#[test]
fn update_flag_is_case_insensitive() {
    let temp_dir = TempDir::new().unwrap();
    write_dataset(&temp_dir.path().join("shop.xml"));
    fs::create_dir(temp_dir.path().join("images")).unwrap();

    dbimages(temp_dir.path())
        .args(["--UPDATE-XML", "shop.xml", "images", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UPDATED: shop.xml applied=0"));
}

#[test]
fn update_of_dataset_without_tables_warns() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("empty.xml"), "<NewDataSet />").unwrap();

    dbimages(temp_dir.path())
        .args(["--update-xml", "empty.xml", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "no tables found, file left unchanged",
        ));

    assert_eq!(
        fs::read_to_string(temp_dir.path().join("empty.xml")).unwrap(),
        "<NewDataSet />"
    );
}

#[test]
fn update_of_missing_source_fails() {
    let temp_dir = TempDir::new().unwrap();

    dbimages(temp_dir.path())
        .args(["--update-xml", "absent.xml", "."])
        .assert()
        .code(1);
}

#[test]
fn dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write_dataset(&temp_dir.path().join("shop.xml"));

    dbimages(temp_dir.path())
        .args([".", "--dry-run", "--output-format", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SOURCE: ./shop.xml (XML DataSet)"));

    assert!(!temp_dir.path().join("DB_shop.xml_Images").exists());
}

#[test]
fn generate_config_writes_sample() {
    let temp_dir = TempDir::new().unwrap();

    dbimages(temp_dir.path())
        .arg("--generate-config")
        .assert()
        .success();

    let content = fs::read_to_string(temp_dir.path().join("dbimages.toml")).unwrap();
    assert!(content.contains("[scan]"));
    assert!(content.contains("legacy_schema_rewrite = true"));
}
