//! Shared helpers: in-memory PDF fixtures, multipart bodies and a local
//! upstream server for URL extraction.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::net::SocketAddr;

pub const BOUNDARY: &str = "pdf-extractor-test-boundary";

/// Build a PDF with one text line per page
pub fn build_pdf(pages: &[&str], info: Option<Dictionary>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content stream"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if let Some(info) = info {
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("serialize PDF");
    buf
}

/// Two pages, "Hello" and "World", titled "Report"
pub fn report_pdf() -> Vec<u8> {
    build_pdf(
        &["Hello", "World"],
        Some(dictionary! { "Title" => Object::string_literal("Report") }),
    )
}

pub const CORRUPT_PDF: &[u8] = b"%PDF-1.4\n%%EOF";

/// One part of a multipart/form-data body
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, content_type: &'a str, data: Vec<u8>) -> Self {
        Self {
            name: "file",
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }

    pub fn text(name: &'a str, value: &str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

/// Encode parts as a multipart/form-data body delimited by [`BOUNDARY`]
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

fn pdf_response(data: Vec<u8>, content_type: &'static str) -> Response {
    ([(header::CONTENT_TYPE, content_type)], data).into_response()
}

/// Size of the oversized upstream documents; tests run with a 1 MiB limit
pub const OVERSIZED_BYTES: usize = 1024 * 1024 + 1;

/// Serve fixture documents on an ephemeral local port
pub async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/docs/report.pdf",
            get(|| async { pdf_response(report_pdf(), "application/pdf") }),
        )
        .route(
            "/download",
            get(|| async { pdf_response(report_pdf(), "application/pdf; charset=binary") }),
        )
        .route(
            "/octet/report.pdf",
            get(|| async { pdf_response(report_pdf(), "application/octet-stream") }),
        )
        .route(
            "/page",
            get(|| async { pdf_response(b"<html></html>".to_vec(), "text/html") }),
        )
        .route(
            "/missing.pdf",
            get(|| async { (StatusCode::NOT_FOUND, "not here").into_response() }),
        )
        .route(
            "/redirect",
            get(|| async { Redirect::temporary("/docs/report.pdf") }),
        )
        .route(
            "/corrupt.pdf",
            get(|| async { pdf_response(CORRUPT_PDF.to_vec(), "application/pdf") }),
        )
        .route(
            "/big.pdf",
            get(|| async { pdf_response(vec![b'x'; OVERSIZED_BYTES], "application/pdf") }),
        )
        .route(
            "/stream.pdf",
            get(|| async {
                let chunks = (0..17).map(|_| Ok::<_, std::io::Error>(vec![b'x'; 64 * 1024]));
                let body = Body::from_stream(futures_util::stream::iter(chunks));
                ([(header::CONTENT_TYPE, "application/pdf")], body).into_response()
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("upstream server");
    });
    addr
}
