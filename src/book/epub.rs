//! EPUB packaging.
//!
//! Writes an EPUB 3 container with an EPUB 2 NCX alongside the navigation
//! document, so older readers still get a table of contents:
//!
//! ```text
//! mimetype                    # stored, first entry
//! META-INF/container.xml
//! OEBPS/content.opf
//! OEBPS/toc.ncx
//! OEBPS/nav.xhtml
//! OEBPS/style.css
//! OEBPS/cover.png             # + cover.xhtml, when a cover exists
//! OEBPS/chapter_1.xhtml ...
//! OEBPS/images/image_1.png ...
//! ```
//!
//! Local images referenced by absolute path are found with [`embed_images`]
//! while the body is still a tree; their `src` is pointed into the archive
//! and the packager copies the files listed in [`Book::images`].

use super::xhtml::Fragment;
use crate::types::Chapter;
use quick_xml::escape::escape;
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Everything needed to write one book.
#[derive(Debug, Clone)]
pub struct Book {
    pub title: String,
    /// Empty omits `dc:creator`.
    pub author: String,
    pub identifier: String,
    pub language: String,
    pub toc_title: String,
    pub css: String,
    pub cover: Option<PathBuf>,
    pub chapters: Vec<Chapter>,
    /// Files referenced by chapter markup, each listed once.
    pub images: Vec<BookImage>,
}

/// A local image copied into the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookImage {
    pub source: PathBuf,
    /// Path inside `OEBPS/`, as written into `src`.
    pub href: String,
}

/// Writes a [`Book`] to a file.
pub trait BookPackager: Sync {
    fn package(&self, book: &Book, output: &Path) -> Result<(), PackageError>;
}

/// Fixed so identical input produces identical archives.
const MODIFIED: &str = "2024-01-01T00:00:00Z";

const CONTAINER_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// EPUB 3 packager.
#[derive(Debug, Default)]
pub struct EpubPackager;

impl EpubPackager {
    pub fn new() -> Self {
        Self
    }
}

impl BookPackager for EpubPackager {
    fn package(&self, book: &Book, output: &Path) -> Result<(), PackageError> {
        let mut file = File::create(output)?;
        self.write(book, &mut file)?;
        file.sync_all()?;
        Ok(())
    }
}

/// One manifest entry besides the fixed ones.
struct ManifestItem {
    id: String,
    href: String,
    media_type: &'static str,
    properties: Option<&'static str>,
}

impl EpubPackager {
    fn write<W: Write + Seek>(&self, book: &Book, writer: W) -> Result<(), PackageError> {
        let mut zip = ZipWriter::new(writer);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // 1. mimetype (must be first, uncompressed)
        zip.start_file("mimetype", stored)?;
        zip.write_all(b"application/epub+zip")?;

        // 2. container.xml
        zip.start_file("META-INF/container.xml", deflated)?;
        zip.write_all(CONTAINER_XML)?;

        // 3. Manifest and spine
        let chapters = &book.chapters;
        let mut manifest = vec![
            ManifestItem {
                id: "nav".into(),
                href: "nav.xhtml".into(),
                media_type: "application/xhtml+xml",
                properties: Some("nav"),
            },
            ManifestItem {
                id: "css".into(),
                href: "style.css".into(),
                media_type: "text/css",
                properties: None,
            },
        ];
        let mut spine: Vec<String> = Vec::new();

        let cover_href = book.cover.as_ref().map(|path| {
            let ext = extension(path).unwrap_or_else(|| "png".to_string());
            format!("cover.{ext}")
        });
        if let Some(href) = &cover_href {
            manifest.push(ManifestItem {
                id: "cover-image".into(),
                href: href.clone(),
                media_type: guess_media_type(href),
                properties: Some("cover-image"),
            });
            manifest.push(ManifestItem {
                id: "cover".into(),
                href: "cover.xhtml".into(),
                media_type: "application/xhtml+xml",
                properties: None,
            });
            spine.push("cover".into());
        }
        spine.push("nav".into());

        for i in 1..=chapters.len() {
            manifest.push(ManifestItem {
                id: format!("chapter_{i}"),
                href: format!("chapter_{i}.xhtml"),
                media_type: "application/xhtml+xml",
                properties: None,
            });
            spine.push(format!("chapter_{i}"));
        }
        for (i, image) in book.images.iter().enumerate() {
            manifest.push(ManifestItem {
                id: format!("image_{}", i + 1),
                href: image.href.clone(),
                media_type: guess_media_type(&image.href),
                properties: None,
            });
        }

        // 4. Package document and navigation
        zip.start_file("OEBPS/content.opf", deflated)?;
        zip.write_all(generate_opf(book, &manifest, &spine, cover_href.is_some()).as_bytes())?;

        zip.start_file("OEBPS/toc.ncx", deflated)?;
        zip.write_all(generate_ncx(book, chapters).as_bytes())?;

        zip.start_file("OEBPS/nav.xhtml", deflated)?;
        zip.write_all(generate_nav(book, chapters).as_bytes())?;

        zip.start_file("OEBPS/style.css", deflated)?;
        zip.write_all(book.css.as_bytes())?;

        // 5. Cover
        if let (Some(path), Some(href)) = (&book.cover, &cover_href) {
            let bytes = fs::read(path)?;
            zip.start_file(format!("OEBPS/{href}"), stored)?;
            zip.write_all(&bytes)?;

            zip.start_file("OEBPS/cover.xhtml", deflated)?;
            zip.write_all(generate_cover_page(book, href).as_bytes())?;
        }

        // 6. Chapters
        for (i, chapter) in chapters.iter().enumerate() {
            zip.start_file(format!("OEBPS/chapter_{}.xhtml", i + 1), deflated)?;
            zip.write_all(chapter_xhtml(book, chapter).as_bytes())?;
        }

        // 7. Images
        for image in &book.images {
            let bytes = fs::read(&image.source)?;
            zip.start_file(format!("OEBPS/{}", image.href), stored)?;
            zip.write_all(&bytes)?;
        }

        zip.finish()?;
        Ok(())
    }
}

/// Point every local `<img>` in `fragment` at its copy inside the archive.
///
/// Returns the images to embed, each distinct file once however often it is
/// used, and the referenced files that do not exist. Sources of missing and
/// remote images are left as written.
pub fn embed_images(fragment: &Fragment) -> (Vec<BookImage>, Vec<PathBuf>) {
    let mut images: Vec<BookImage> = Vec::new();
    let mut missing: Vec<PathBuf> = Vec::new();

    for img in fragment.elements("img") {
        let Some(path) = img.attr("src").as_deref().and_then(local_path) else {
            continue;
        };
        if let Some(embedded) = images.iter().find(|i| i.source == path) {
            img.set_attr("src", &embedded.href);
            continue;
        }
        if !path.is_file() {
            if !missing.contains(&path) {
                missing.push(path);
            }
            continue;
        }
        let n = images.len() + 1;
        let href = match extension(&path) {
            Some(ext) => format!("images/image_{n}.{ext}"),
            None => format!("images/image_{n}"),
        };
        img.set_attr("src", &href);
        images.push(BookImage { source: path, href });
    }

    (images, missing)
}

/// Filesystem path of an absolute `src`, undoing URL escaping.
fn local_path(src: &str) -> Option<PathBuf> {
    let raw = src.strip_prefix("file://").unwrap_or(src);
    if !raw.starts_with('/') || raw.starts_with("//") {
        return None;
    }
    let decoded = urlencoding::decode(raw).ok()?;
    Some(PathBuf::from(decoded.into_owned()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn generate_opf(book: &Book, manifest: &[ManifestItem], spine: &[String], has_cover: bool) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape(&book.identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape(&book.title)
    ));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape(&book.language)
    ));
    if !book.author.is_empty() {
        opf.push_str(&format!(
            "    <dc:creator>{}</dc:creator>\n",
            escape(&book.author)
        ));
    }
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{MODIFIED}</meta>\n"
    ));
    if has_cover {
        // EPUB 2 readers locate the cover through this.
        opf.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
    }
    opf.push_str("  </metadata>\n");

    opf.push_str("  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    for item in manifest {
        let properties = item
            .properties
            .map(|p| format!(" properties=\"{p}\""))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{}/>\n",
            escape(&item.id),
            escape(&item.href),
            item.media_type,
            properties
        ));
    }
    opf.push_str("  </manifest>\n");

    opf.push_str("  <spine toc=\"ncx\">\n");
    for id in spine {
        opf.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape(id)));
    }
    opf.push_str("  </spine>\n");

    opf.push_str("</package>\n");
    opf
}

fn generate_ncx(book: &Book, chapters: &[Chapter]) -> String {
    let mut ncx = String::new();

    ncx.push_str(&format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
"#,
        escape(&book.identifier),
        escape(&book.title)
    ));

    for (i, chapter) in chapters.iter().enumerate() {
        let n = i + 1;
        ncx.push_str(&format!(
            r#"    <navPoint id="navpoint_{n}" playOrder="{n}">
      <navLabel>
        <text>{}</text>
      </navLabel>
      <content src="chapter_{n}.xhtml"/>
    </navPoint>
"#,
            escape(&chapter.title)
        ));
    }

    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}

fn generate_nav(book: &Book, chapters: &[Chapter]) -> String {
    let items: String = chapters
        .iter()
        .enumerate()
        .map(|(i, chapter)| {
            format!(
                "      <li><a href=\"chapter_{}.xhtml\">{}</a></li>\n",
                i + 1,
                escape(&chapter.title)
            )
        })
        .collect();

    format!(
        r#"{}
<body>
  <nav epub:type="toc" id="toc">
    <h1>{}</h1>
    <ol>
{}    </ol>
  </nav>
</body>
</html>
"#,
        xhtml_head(&book.language, &book.toc_title),
        escape(&book.toc_title),
        items
    )
}

fn generate_cover_page(book: &Book, href: &str) -> String {
    format!(
        r#"{}
<body>
  <div style="text-align: center;">
    <img src="{}" alt="{}" style="max-width: 100%; max-height: 100%;"/>
  </div>
</body>
</html>
"#,
        xhtml_head(&book.language, &book.title),
        escape(href),
        escape(&book.title)
    )
}

fn chapter_xhtml(book: &Book, chapter: &Chapter) -> String {
    format!(
        "{}\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>\n",
        xhtml_head(&book.language, &chapter.title),
        escape(&chapter.title),
        chapter.data
    )
}

/// Everything up to and including `</head>`.
fn xhtml_head(language: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style.css"/>
</head>"#,
        lang = escape(language),
        title = escape(title)
    )
}

fn guess_media_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::test_helpers::{assert_well_formed, write_test_png, zip_entries, zip_text};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records packaged books instead of writing archives.
    #[derive(Default)]
    pub struct MockPackager {
        pub books: Mutex<Vec<(Book, PathBuf)>>,
    }

    impl MockPackager {
        pub fn get_books(&self) -> Vec<(Book, PathBuf)> {
            self.books.lock().unwrap().clone()
        }
    }

    impl BookPackager for MockPackager {
        fn package(&self, book: &Book, output: &Path) -> Result<(), PackageError> {
            self.books
                .lock()
                .unwrap()
                .push((book.clone(), output.to_path_buf()));
            Ok(())
        }
    }

    fn sample_book(chapters: Vec<Chapter>) -> Book {
        Book {
            title: "Rust & You".to_string(),
            author: "Jane Doe".to_string(),
            identifier: "urn:sha256:abc".to_string(),
            language: "en".to_string(),
            toc_title: "Contents".to_string(),
            css: "body { margin: 0; }".to_string(),
            cover: None,
            chapters,
            images: Vec::new(),
        }
    }

    fn chapter(title: &str, data: &str) -> Chapter {
        Chapter {
            title: title.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn writes_epub_layout_with_mimetype_first() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("book.epub");
        let book = sample_book(vec![chapter("One", "<p>a</p>"), chapter("Two", "<p>b</p>")]);

        EpubPackager::new().package(&book, &out).unwrap();

        let entries = zip_entries(&out);
        assert_eq!(entries[0], "mimetype");
        for expected in [
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/toc.ncx",
            "OEBPS/nav.xhtml",
            "OEBPS/style.css",
            "OEBPS/chapter_1.xhtml",
            "OEBPS/chapter_2.xhtml",
        ] {
            assert!(entries.iter().any(|e| e == expected), "missing {expected}");
        }
        assert_eq!(zip_text(&out, "mimetype"), "application/epub+zip");

        let file = File::open(&out).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn metadata_and_toc_use_book_fields() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("book.epub");
        EpubPackager::new()
            .package(&sample_book(vec![chapter("Intro", "<p>x</p>")]), &out)
            .unwrap();

        let opf = zip_text(&out, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Rust &amp; You</dc:title>"));
        assert!(opf.contains("<dc:creator>Jane Doe</dc:creator>"));
        assert!(opf.contains("<dc:identifier id=\"BookId\">urn:sha256:abc</dc:identifier>"));
        assert!(opf.contains("<itemref idref=\"chapter_1\"/>"));

        let nav = zip_text(&out, "OEBPS/nav.xhtml");
        assert!(nav.contains("<h1>Contents</h1>"));
        assert!(nav.contains("<a href=\"chapter_1.xhtml\">Intro</a>"));

        let ncx = zip_text(&out, "OEBPS/toc.ncx");
        assert_eq!(ncx.matches("<navPoint ").count(), 1);

        let chapter = zip_text(&out, "OEBPS/chapter_1.xhtml");
        assert!(chapter.starts_with("<?xml"));
        assert!(chapter.contains("<h1>Intro</h1>\n<p>x</p>"));
    }

    #[test]
    fn empty_author_omits_creator() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("book.epub");
        let mut book = sample_book(vec![chapter("A", "")]);
        book.author.clear();
        EpubPackager::new().package(&book, &out).unwrap();
        assert!(!zip_text(&out, "OEBPS/content.opf").contains("dc:creator"));
    }

    #[test]
    fn embeds_cover() {
        let tmp = TempDir::new().unwrap();
        let cover = tmp.path().join("demo.png");
        write_test_png(&cover, 10, 16);
        let out = tmp.path().join("book.epub");
        let mut book = sample_book(vec![chapter("A", "<p>a</p>")]);
        book.cover = Some(cover);

        EpubPackager::new().package(&book, &out).unwrap();

        let entries = zip_entries(&out);
        assert!(entries.iter().any(|e| e == "OEBPS/cover.png"));
        assert!(entries.iter().any(|e| e == "OEBPS/cover.xhtml"));
        let opf = zip_text(&out, "OEBPS/content.opf");
        assert!(opf.contains("properties=\"cover-image\""));
        assert!(opf.contains("<meta name=\"cover\" content=\"cover-image\"/>"));
    }

    #[test]
    fn embed_images_dedupes_and_rewrites_src() {
        let tmp = TempDir::new().unwrap();
        let img = tmp.path().join("my assets/pic.png");
        write_test_png(&img, 4, 4);
        let src = format!("{}/my%20assets/pic.png", tmp.path().display());
        let fragment = Fragment::parse(&format!(
            "<p><img src=\"{src}\" alt=\"a\"></p><h1>B</h1><img alt=\"b\" src=\"{src}\">"
        ));

        let (images, missing) = embed_images(&fragment);
        assert_eq!(
            images,
            vec![BookImage {
                source: img,
                href: "images/image_1.png".to_string()
            }]
        );
        assert!(missing.is_empty());
        assert_eq!(
            fragment.to_xhtml(),
            r#"<p><img src="images/image_1.png" alt="a"/></p><h1>B</h1><img alt="b" src="images/image_1.png"/>"#
        );
    }

    #[test]
    fn missing_and_remote_images_are_left_alone() {
        let html = r#"<img src="/nowhere/x.png"/><img src="https://example.com/y.png"/><img src="/nowhere/x.png"/>"#;
        let fragment = Fragment::parse(html);

        let (images, missing) = embed_images(&fragment);
        assert!(images.is_empty());
        assert_eq!(missing, vec![PathBuf::from("/nowhere/x.png")]);
        assert_eq!(fragment.to_xhtml(), html);
    }

    #[test]
    fn listed_images_are_stored_in_archive() {
        let tmp = TempDir::new().unwrap();
        let img = tmp.path().join("pic.png");
        write_test_png(&img, 4, 4);
        let mut book = sample_book(vec![chapter("A", r#"<img src="images/image_1.png"/>"#)]);
        book.images = vec![BookImage {
            source: img.clone(),
            href: "images/image_1.png".to_string(),
        }];
        let out = tmp.path().join("book.epub");

        EpubPackager::new().package(&book, &out).unwrap();

        let file = File::open(&out).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let stored = archive.by_name("OEBPS/images/image_1.png").unwrap();
        assert_eq!(stored.size(), fs::metadata(&img).unwrap().len());
        drop(stored);
        let opf = zip_text(&out, "OEBPS/content.opf");
        assert!(opf.contains(r#"<item id="image_1" href="images/image_1.png" media-type="image/png"/>"#));
    }

    #[test]
    fn every_xml_entry_is_well_formed() {
        let tmp = TempDir::new().unwrap();
        let cover = tmp.path().join("demo.png");
        write_test_png(&cover, 10, 16);
        let mut book = sample_book(vec![chapter("<One> & \"Two\"", "<p>a<br/>b</p>")]);
        book.cover = Some(cover);
        let out = tmp.path().join("book.epub");

        EpubPackager::new().package(&book, &out).unwrap();

        for name in zip_entries(&out) {
            if name.ends_with(".xhtml") || name.ends_with(".opf") || name.ends_with(".ncx") || name.ends_with(".xml") {
                assert_well_formed(&zip_text(&out, &name));
            }
        }
    }

    #[test]
    fn missing_output_dir_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("no/such/dir/book.epub");
        let result = EpubPackager::new().package(&sample_book(vec![]), &out);
        assert!(matches!(result, Err(PackageError::Io(_))));
    }

    #[test]
    fn local_path_decodes_and_filters() {
        assert_eq!(local_path("/a%20b/c.png"), Some(PathBuf::from("/a b/c.png")));
        assert_eq!(local_path("file:///a/c.png"), Some(PathBuf::from("/a/c.png")));
        assert_eq!(local_path("images/c.png"), None);
        assert_eq!(local_path("//cdn.example.com/c.png"), None);
    }
}
