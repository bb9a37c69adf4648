//! Conversion of files on disk into typed content blocks.
//!
//! Attaching a file is a two step pipeline: [`check_size`] rejects anything larger than
//! [`MAX_ATTACHMENT_BYTES`] (or missing), and only then does [`AttachmentPreparer::prepare`]
//! read the file and turn it into a [`ContentBlock`].  The session runs both steps from a single
//! call site; the preparer itself never looks at the size.

use std::fs;
use std::io;
use std::path::Path;

use base64::Engine;

use crate::error::{Error, Result};
use crate::types::{ContentBlock, ImageMediaType};

/// Largest attachment accepted, in bytes (5 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// How a file will be turned into content, decided from its extension.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// An image the engine accepts directly.
    Image(ImageMediaType),
    /// A PDF document whose text is extracted.
    Pdf,
    /// Anything else; must decode as UTF-8.
    Text,
}

impl FileKind {
    /// Classify a path by its extension.
    pub fn classify(path: &Path) -> Self {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return FileKind::Text;
        };
        if let Some(media_type) = ImageMediaType::from_extension(extension) {
            FileKind::Image(media_type)
        } else if extension.eq_ignore_ascii_case("pdf") {
            FileKind::Pdf
        } else {
            FileKind::Text
        }
    }
}

/// Reject paths that are missing or exceed [`MAX_ATTACHMENT_BYTES`].
///
/// Returns the file size on success.
pub fn check_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Error::file_not_found(path),
        _ => Error::io(format!("could not stat {}", path.display()), err),
    })?;
    if !metadata.is_file() {
        return Err(Error::file_not_found(path));
    }
    let size = metadata.len();
    if size > MAX_ATTACHMENT_BYTES {
        return Err(Error::file_too_large(path, size, MAX_ATTACHMENT_BYTES));
    }
    Ok(size)
}

/// Returns the file name of `path` for labels and acknowledgements.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Turns a file into a content block.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttachmentPreparer;

impl AttachmentPreparer {
    /// Create a new preparer.
    pub fn new() -> Self {
        Self
    }

    /// Read `path` and produce a content block for it.
    ///
    /// Images become base64 [`ContentBlock::Image`] blocks.  PDFs and text files become
    /// [`ContentBlock::Text`] blocks labeled with the file name.  Any other binary file is
    /// refused with [`Error::UnsupportedBinary`].
    pub fn prepare(&self, path: &Path) -> Result<ContentBlock> {
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::file_not_found(path),
            _ => Error::io(format!("could not read {}", path.display()), err),
        })?;
        match FileKind::classify(path) {
            FileKind::Image(media_type) => {
                let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Ok(ContentBlock::image(media_type, data))
            }
            FileKind::Pdf => {
                let text = extract_pdf_text(path, &bytes)?;
                Ok(ContentBlock::labeled_text(text, display_name(path)))
            }
            FileKind::Text => match String::from_utf8(bytes) {
                Ok(text) => Ok(ContentBlock::labeled_text(text, display_name(path))),
                Err(_) => Err(Error::unsupported_binary(path)),
            },
        }
    }
}

fn extract_pdf_text(path: &Path, bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|err| Error::pdf_extraction(path, err.to_string()))?;
    let mut text = String::new();
    // get_pages is keyed by page number, so iteration is in page order.
    for page_number in document.get_pages().keys() {
        let page = document
            .extract_text(&[*page_number])
            .map_err(|err| Error::pdf_extraction(path, format!("page {page_number}: {err}")))?;
        text.push_str(&page);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    /// Write a PDF with one line of text per page.
    fn write_pdf(path: &Path, pages: &[&str]) {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });
        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn classify_by_extension() {
        assert_eq!(
            FileKind::classify(Path::new("photo.JPEG")),
            FileKind::Image(ImageMediaType::Jpeg)
        );
        assert_eq!(FileKind::classify(Path::new("paper.pdf")), FileKind::Pdf);
        assert_eq!(FileKind::classify(Path::new("notes.md")), FileKind::Text);
        assert_eq!(FileKind::classify(Path::new("Makefile")), FileKind::Text);
    }

    #[test]
    fn text_file_is_labeled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.txt", b"hello there");
        let block = AttachmentPreparer::new().prepare(&path).unwrap();
        assert_eq!(block, ContentBlock::labeled_text("hello there", "a.txt"));
    }

    #[test]
    fn image_is_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "b.png", &[0x89, b'P', b'N', b'G']);
        let block = AttachmentPreparer::new().prepare(&path).unwrap();
        assert_eq!(block, ContentBlock::image(ImageMediaType::Png, "iVBORw=="));
    }

    #[test]
    fn binary_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.out", &[0xff, 0xfe, 0x00, 0x80]);
        let err = AttachmentPreparer::new().prepare(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedBinary { .. }));
    }

    #[test]
    fn pdf_pages_are_extracted_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.pdf");
        write_pdf(&path, &["first page", "second page"]);

        let block = AttachmentPreparer::new().prepare(&path).unwrap();
        let (text, source_label) = match block {
            ContentBlock::Text { text, source_label } => (text, source_label),
            other => panic!("expected a text block, got {other:?}"),
        };
        assert_eq!(source_label.as_deref(), Some("x.pdf"));
        let first = text.find("first page").expect("page 1 text");
        let second = text.find("second page").expect("page 2 text");
        assert!(first < second, "{text:?}");
    }

    #[test]
    fn broken_pdf_fails_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "paper.pdf", b"this is not a pdf");
        let err = AttachmentPreparer::new().prepare(&path).unwrap_err();
        assert!(matches!(err, Error::PdfExtraction { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        assert!(matches!(
            AttachmentPreparer::new().prepare(&path),
            Err(Error::FileNotFound { .. })
        ));
        assert!(matches!(check_size(&path), Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn size_guard() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_file(dir.path(), "small.txt", b"ok");
        assert_eq!(check_size(&small).unwrap(), 2);

        let big = dir.path().join("big.txt");
        let file = File::create(&big).unwrap();
        file.set_len(MAX_ATTACHMENT_BYTES + 1).unwrap();
        let err = check_size(&big).unwrap_err();
        assert!(matches!(
            err,
            Error::FileTooLarge { size, limit, .. }
                if size == MAX_ATTACHMENT_BYTES + 1 && limit == MAX_ATTACHMENT_BYTES
        ));

        let exact = dir.path().join("exact.txt");
        File::create(&exact)
            .unwrap()
            .set_len(MAX_ATTACHMENT_BYTES)
            .unwrap();
        assert!(check_size(&exact).is_ok());
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            check_size(dir.path()),
            Err(Error::FileNotFound { .. })
        ));
    }
}
