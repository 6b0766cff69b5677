//! Builder patterns for creating test configurations and attachment payloads.
//!
//! Provides fluent builders for `TriageConfig` plus helpers that produce
//! real PDF and DOCX bytes, so the extractors run against the same formats
//! they see in production.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use lopdf::{dictionary, Document, Object, Stream};

use resume_triage::config::{
    AuthConfig, DownloadConfig, FetchConfig, JobSpec, MailboxConfig, OcrConfig, OutputConfig,
    ScoringConfig, TriageConfig,
};
use resume_triage::mailbox::{AttachmentRef, EmailMessage};
use resume_triage::SecretSource;

pub const ENDPOINT: &str =
    "https://graph.example.test/v1.0/users/rh@example.com/messages?$filter=isRead eq false";

pub const PDF_MIME: &str = "application/pdf";

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Builder for a `TriageConfig` whose output and cache live under a temp root.
pub struct ConfigBuilder {
    job: JobSpec,
    fetch: FetchConfig,
    downloads: DownloadConfig,
    mark_as_read: bool,
    worker_count: usize,
}

impl ConfigBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            job: JobSpec {
                title: title.to_string(),
                ..Default::default()
            },
            fetch: FetchConfig::default(),
            downloads: DownloadConfig::default(),
            mark_as_read: true,
            worker_count: 2,
        }
    }

    /// The job used by most tests: Python developers with a computing degree.
    pub fn python_developer() -> Self {
        Self::new("Desenvolvedor Python")
            .required(&["python", "django"])
            .desired(&["docker"])
            .formations(&["ciencia da computacao"])
            .negative(&["estagio"])
    }

    pub fn required(mut self, keywords: &[&str]) -> Self {
        self.job.required_keywords = keywords.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn desired(mut self, keywords: &[&str]) -> Self {
        self.job.desired_keywords = keywords.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn negative(mut self, keywords: &[&str]) -> Self {
        self.job.negative_keywords = keywords.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn formations(mut self, formations: &[&str]) -> Self {
        self.job.formations = formations.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn threshold(mut self, threshold: u32) -> Self {
        self.job.threshold = Some(threshold);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.fetch.max_attempts = attempts;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.downloads.exclude.push(pattern.to_string());
        self
    }

    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.downloads.max_bytes = max_bytes;
        self
    }

    pub fn mark_as_read(mut self, mark: bool) -> Self {
        self.mark_as_read = mark;
        self
    }

    pub fn build(self, root: &Path) -> TriageConfig {
        TriageConfig {
            version: "1.0".to_string(),
            job: self.job,
            mailbox: Some(MailboxConfig {
                endpoint: ENDPOINT.to_string(),
                base_url: None,
                auth: AuthConfig::Token {
                    token: SecretSource {
                        value: Some("test-token".to_string()),
                        file: None,
                        env: None,
                    },
                },
                mark_as_read: self.mark_as_read,
            }),
            fetch: self.fetch,
            downloads: self.downloads,
            ocr: OcrConfig {
                enabled: false,
                ..Default::default()
            },
            scoring: ScoringConfig::default(),
            output: OutputConfig {
                approved_directory: root.join("approved"),
                cache_path: root.join(".triage_cache/hashes.json"),
                report_path: None,
            },
            worker_count: self.worker_count,
        }
    }
}

pub fn message(id: &str, has_attachments: bool) -> EmailMessage {
    EmailMessage {
        id: id.to_string(),
        subject: format!("Candidatura {}", id),
        sender: Some(format!("{}@candidatos.example", id)),
        received_at: None,
        has_attachments,
        is_read: false,
    }
}

pub fn attachment_ref(id: &str, name: &str, content_type: &str, size: usize) -> AttachmentRef {
    AttachmentRef {
        id: id.to_string(),
        name: name.to_string(),
        content_type: Some(content_type.to_string()),
        size: Some(size as u64),
        odata_type: Some("#microsoft.graph.fileAttachment".to_string()),
        is_inline: false,
        content_bytes: None,
    }
}

/// Single-page PDF with one text line per entry.
pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut content = String::from("BT /F1 11 Tf 40 760 Td 14 TL\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", line));
    }
    content.push_str("ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A PDF page without any text layer, like a scanned document.
pub fn scanned_pdf() -> Vec<u8> {
    pdf_with_lines(&[])
}

/// Resume text long enough to count as a real text layer.
pub fn python_resume_lines() -> Vec<&'static str> {
    vec![
        "Joao Silva - Desenvolvedor Python",
        "Bacharel em Ciencia da Computacao pela USP",
        "Experiencia com Python, Django e Docker em producao",
        "Cinco anos construindo APIs REST e pipelines de dados",
    ]
}

pub fn accountant_resume_lines() -> Vec<&'static str> {
    vec![
        "Maria Souza - Analista Contabil",
        "Formada em Ciencias Contabeis",
        "Fechamento mensal, conciliacoes bancarias e apuracao de impostos",
        "Experiencia com SAP e planilhas avancadas",
    ]
}

pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// A plain zip archive that happens to contain a resume.
pub fn zip_archive() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("cv.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer
        .write_all(b"Desenvolvedor Python com Django, Ciencia da Computacao")
        .unwrap();
    writer.finish().unwrap().into_inner()
}
