//! PDF documents and tables for tests

use lopdf::{Document, Object, Stream, dictionary};
use pdf_dl::{Config, Grid, MemoryTable};

/// Bytes that start like a PDF but are not one
pub const HEADER_ONLY: &[u8] = b"%PDF-1.4 not really a document";

/// An HTML error page served with status 200
pub const HTML_PAGE: &[u8] = b"<html><body>Access denied</body></html>";

/// Serialized PDF with `pages` empty pages
pub fn pdf_with_pages(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            }))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize PDF fixture");
    bytes
}

/// A one page PDF
pub fn one_page_pdf() -> Vec<u8> {
    pdf_with_pages(1)
}

/// Convert string slices to owned cells
pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Input table with the default name, primary and fallback headers
pub fn input_table(rows: &[(&str, &str, &str)]) -> MemoryTable {
    let names = rows.iter().map(|r| r.0.to_string()).collect();
    let primary = rows.iter().map(|r| r.1.to_string()).collect();
    let fallback = rows.iter().map(|r| r.2.to_string()).collect();
    MemoryTable::read_only(
        Grid::from_columns([
            ("BRnum", names),
            ("Pdf_URL", primary),
            ("Database link", fallback),
        ])
        .expect("unique headers"),
    )
}

/// Configuration writing to `output_dir` with a fast refresh and short timeouts
pub fn test_config(output_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.output_dir = Some(output_dir.to_path_buf());
    config.fetch.max_concurrent_fetches = 4;
    config.fetch.request_timeout = Some(std::time::Duration::from_secs(5));
    config.progress.refresh_interval = std::time::Duration::from_millis(10);
    config
}
