//! End-to-end CLI tests that run the built binary against a temp project.
//!
//! Only commands that need no browser are exercised here; image rendering
//! against a live Chrome lives in `browser_capture.rs`.

use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

const DEMO_POST: &str = r#"---
title: Demo Guide
slug: demo
description: A short demo
homeImage: /assets/img/logo.png
---
Welcome to the guide.<br>
Raw markup <img src="/assets/img/logo.png" alt="logo"> is fine too.

## Getting started

![logo](/assets/img/logo.png)

```rust
## not a heading
fn main() {}
```

## Going further

Read the [notes](/assets/notes.txt) too.
"#;

fn guidepress(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_guidepress"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("failed to run guidepress")
}

fn write(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// A project with one real post, one template, a stylesheet and one image.
fn demo_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "src/posts/demo/index.md", DEMO_POST.as_bytes());
    write(
        root,
        "src/posts/_template/index.md",
        b"---\ntitle: Template\nslug: template\n---\n## Nope\n",
    );
    write(root, "src/assets/css/book.css", b"body { margin: 0; }\n");
    write(root, "src/assets/notes.txt", b"notes\n");

    let logo = root.join("src/assets/img/logo.png");
    fs::create_dir_all(logo.parent().unwrap()).unwrap();
    image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 30, 30, 255]))
        .save(&logo)
        .unwrap();
    tmp
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Panic unless `xml` parses as one well-formed XML document.
fn assert_well_formed(name: &str, xml: &str) {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(_)) => depth += 1,
            Ok(quick_xml::events::Event::End(_)) => depth -= 1,
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("{name} is not well-formed XML: {e}\n{xml}"),
        }
    }
    assert_eq!(depth, 0, "{name} leaves elements open");
}

fn zip_entry(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_lists_posts_and_skips_templates() {
    let project = demo_project();
    let output = guidepress(project.path(), &["check"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(text.contains("001 Demo Guide"));
    assert!(text.contains("Slug: demo"));
    assert!(!text.contains("Template"));
    assert!(text.contains("==> Content is valid"));
}

#[test]
fn check_json_uses_front_matter_names() {
    let project = demo_project();
    let output = guidepress(project.path(), &["check", "--json"]);
    assert!(output.status.success());

    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["slug"], "demo");
    assert_eq!(items[0]["homeImage"], "/assets/img/logo.png");
    assert!(items[0].get("body").is_none());
}

#[test]
fn check_fails_on_missing_slug() {
    let project = demo_project();
    write(
        project.path(),
        "src/posts/broken/index.md",
        b"---\ntitle: Broken\n---\nbody\n",
    );

    let output = guidepress(project.path(), &["check"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("slug"));
}

#[test]
fn check_rejects_unknown_config_keys() {
    let project = demo_project();
    write(project.path(), "guidepress.toml", b"[book]\ncolour = \"red\"\n");

    let output = guidepress(project.path(), &["check"]);
    assert!(!output.status.success());
}

#[test]
fn explicit_config_must_exist() {
    let project = demo_project();
    let output = guidepress(project.path(), &["--config", "nope.toml", "check"]);
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// books
// ---------------------------------------------------------------------------

#[test]
fn books_exports_three_chapters_without_relative_links() {
    let project = demo_project();
    let output = guidepress(project.path(), &["books"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Exported 1 book"));

    let epub = project.path().join("src/books/Demo Guide.epub");
    assert!(epub.exists());

    let names = zip_names(&epub);
    assert_eq!(names[0], "mimetype");
    let chapters: Vec<_> = names
        .iter()
        .filter(|n| n.starts_with("OEBPS/chapter_"))
        .collect();
    assert_eq!(chapters.len(), 3);
    assert!(names.iter().any(|n| n == "OEBPS/images/image_1.png"));

    for name in chapters {
        let xhtml = zip_entry(&epub, name);
        assert!(!xhtml.contains("\"/assets/"), "{name} has a relative asset link");
        assert_well_formed(name, &xhtml);
    }

    let first = zip_entry(&epub, "OEBPS/chapter_1.xhtml");
    assert!(first.contains("Welcome to the guide.<br/>"));
    assert!(first.contains(r#"<img src="images/image_1.png" alt="logo"/>"#));
    assert!(first.contains("Getting started"));

    let last = zip_entry(&epub, "OEBPS/chapter_3.xhtml");
    assert!(last.contains("Thank you for purchasing this guide."));
    assert!(last.contains("get started with Demo Guide"));
}

#[test]
fn books_refuses_two_posts_with_one_title() {
    let project = demo_project();
    write(
        project.path(),
        "src/posts/again/index.md",
        b"---\ntitle: Demo Guide\nslug: again\n---\n## Twice\n",
    );

    let output = guidepress(project.path(), &["books"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Demo Guide.epub"), "{stderr}");
    assert!(!project.path().join("src/books/Demo Guide.epub").exists());
}

#[test]
fn check_reports_colliding_titles() {
    let project = demo_project();
    write(
        project.path(),
        "src/posts/again/index.md",
        b"---\ntitle: Demo Guide\nslug: again\n---\n## Twice\n",
    );

    let output = guidepress(project.path(), &["check"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn books_warns_about_missing_cover() {
    let project = demo_project();
    let output = guidepress(project.path(), &["books"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("warning: Demo Guide: no cover"));
}

#[test]
fn books_embeds_cover_when_present() {
    let project = demo_project();
    let cover = project.path().join("src/assets/img/books/demo.png");
    fs::create_dir_all(cover.parent().unwrap()).unwrap();
    image::RgbaImage::from_pixel(10, 16, image::Rgba([0, 0, 0, 255]))
        .save(&cover)
        .unwrap();

    let output = guidepress(project.path(), &["books"]);
    assert!(output.status.success());

    let epub = project.path().join("src/books/Demo Guide.epub");
    let names = zip_names(&epub);
    assert!(names.iter().any(|n| n == "OEBPS/cover.png"));
    assert!(names.iter().any(|n| n == "OEBPS/cover.xhtml"));
}

#[test]
fn books_fails_without_stylesheet() {
    let project = demo_project();
    fs::remove_file(project.path().join("src/assets/css/book.css")).unwrap();

    let output = guidepress(project.path(), &["books"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!project.path().join("src/books/Demo Guide.epub").exists());
}

#[test]
fn books_honours_config_overrides() {
    let project = demo_project();
    write(
        project.path(),
        "guidepress.toml",
        b"[book]\noutput_dir = \"out\"\nauthor = \"Ada\"\n",
    );

    let output = guidepress(project.path(), &["books"]);
    assert!(output.status.success());

    let epub = project.path().join("out/Demo Guide.epub");
    let opf = zip_entry(&epub, "OEBPS/content.opf");
    assert!(opf.contains("<dc:creator>Ada</dc:creator>"));
}

// ---------------------------------------------------------------------------
// gen-config
// ---------------------------------------------------------------------------

#[test]
fn gen_config_round_trips_as_valid_config() {
    let project = demo_project();
    let output = guidepress(project.path(), &["gen-config"]);
    assert!(output.status.success());

    write(project.path(), "guidepress.toml", &output.stdout);
    let check = guidepress(project.path(), &["check"]);
    assert!(check.status.success(), "{}", String::from_utf8_lossy(&check.stderr));
}
