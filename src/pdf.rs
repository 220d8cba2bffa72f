//! PDF backend – turns a [`PagePlan`] into PDF bytes with `printpdf`
//! (v0.8 ops-based API).

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::page_plan::{PagePlan, PlacedBox, TextContent};

const PT_TO_MM: f32 = 0.352_778;

/// Registered image plus the pixel size of its source.
struct EmbeddedImage {
    id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a page plan into PDF bytes.
///
/// Images whose `src` is not a base64 data URI, or which fail to decode, are
/// skipped with a warning.
pub fn render_pdf(plan: &PagePlan) -> Result<Vec<u8>, String> {
    let page_w = Mm(plan.page_width_pt * PT_TO_MM);
    let page_h = Mm(plan.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&plan.title);
    let images = embed_images(&mut doc, plan);

    let mut pages: Vec<PdfPage> = plan
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for placed in &page.boxes {
                draw_box(&mut ops, placed, plan.page_height_pt, &images);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    log::debug!("writing {} PDF page(s)", pages.len());
    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    if bytes.is_empty() {
        return Err("PDF serialisation produced no output".to_string());
    }
    Ok(bytes)
}

fn embed_images(doc: &mut PdfDocument, plan: &PagePlan) -> HashMap<String, EmbeddedImage> {
    let mut srcs = Vec::new();
    for page in &plan.pages {
        for placed in &page.boxes {
            placed.visit(&mut |b| {
                if let Some(img) = &b.image {
                    if !srcs.contains(&img.src.as_str()) {
                        srcs.push(img.src.as_str());
                    }
                }
            });
        }
    }

    let mut embedded = HashMap::new();
    let mut warnings = Vec::new();
    for src in srcs {
        let decoded = decode_data_uri(src).and_then(|bytes| {
            let dims = ::image::load_from_memory(&bytes)
                .map(|img| (img.width(), img.height()))
                .map_err(|e| format!("decode error: {e}"))?;
            let raw = RawImage::decode_from_bytes(&bytes, &mut warnings)
                .map_err(|e| format!("embed error: {e}"))?;
            Ok((raw, dims))
        });
        match decoded {
            Ok((raw, (px_width, px_height))) => {
                let id = doc.add_image(&raw);
                embedded.insert(
                    src.to_string(),
                    EmbeddedImage {
                        id,
                        px_width,
                        px_height,
                    },
                );
            }
            Err(e) => log::warn!("skipping image: {e}"),
        }
    }
    embedded
}

/// Decode a `data:<mime>;base64,<payload>` URI.
pub(crate) fn decode_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let shown: String = src.chars().take(60).collect();
        format!("image src is not a data URI: {shown:?}")
    })?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI has no `,` separator".to_string())?;
    if !header.ends_with(";base64") {
        return Err("only base64 data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(payload.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Builtin fonts only cover WinAnsi; anything outside ASCII is folded to a
/// close ASCII spelling or `?`.
fn to_builtin_text(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2022}' => '*',
            '\u{00A0}' => ' ',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}

fn rgb(c: &[f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<LinePoint> {
    vec![point(x1, y1), point(x2, y1), point(x2, y2), point(x1, y2)]
}

fn builtin_font(text: &TextContent) -> BuiltinFont {
    match (text.bold, text.italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

fn write_text(ops: &mut Vec<Op>, x: f32, y: f32, text: &TextContent, font: BuiltinFont, s: &str) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(text.font_size),
        font,
    });
    ops.push(Op::SetLineHeight {
        lh: Pt(text.line_height),
    });
    ops.push(Op::SetFillColor {
        col: rgb(&text.color),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_builtin_text(s))],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Emit ops for one box and its subtree. Plan coordinates have a top-left
/// origin; PDF space is bottom-left.
fn draw_box(
    ops: &mut Vec<Op>,
    placed: &PlacedBox,
    page_height: f32,
    images: &HashMap<String, EmbeddedImage>,
) {
    let top = page_height - placed.y;
    let bottom = top - placed.height;
    let (left, right) = (placed.x, placed.x + placed.width);

    if let Some(bg) = &placed.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: rect(left, bottom, right, top),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    if let Some(border) = &placed.border {
        ops.push(Op::SetOutlineColor {
            col: rgb(&border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: rect(left, bottom, right, top),
                is_closed: true,
            },
        });
    }

    if let Some(text) = &placed.text {
        let font = builtin_font(text);
        let ascent = text.font_size * 0.75;
        for line in text.lines.iter().filter(|l| !l.text.is_empty()) {
            let x = left + line.x_offset;
            let baseline = top - line.y_offset - ascent;
            write_text(ops, x, baseline, text, font, &line.text);

            if text.underline {
                let y = baseline - text.font_size * 0.1;
                ops.push(Op::SetOutlineThickness { pt: Pt(0.5) });
                ops.push(Op::SetOutlineColor {
                    col: rgb(&text.color),
                });
                ops.push(Op::DrawLine {
                    line: Line {
                        points: vec![point(x, y), point(x + line.width, y)],
                        is_closed: false,
                    },
                });
            }
        }
        if let Some(marker) = &text.list_marker {
            let gutter = text.font_size * 1.2;
            write_text(ops, left - gutter, top - ascent, text, BuiltinFont::Helvetica, marker);
        }
    }

    if let Some(img) = &placed.image {
        if let Some(res) = images.get(&img.src) {
            // At 72 dpi one image pixel is one point.
            let scale_x = img.width / res.px_width.max(1) as f32;
            let scale_y = img.height / res.px_height.max(1) as f32;
            ops.push(Op::UseXobject {
                id: res.id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(left)),
                    translate_y: Some(Pt(top - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }

    for child in &placed.children {
        draw_box(ops, child, page_height, images);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_plan::{PlannedPage, TextLine};

    fn a4() -> PagePlan {
        PagePlan::new("test", 595.28, 841.89)
    }

    #[test]
    fn empty_plan_still_yields_a_document() {
        let bytes = render_pdf(&a4()).expect("render");
        assert_eq!(&bytes[..5], b"%PDF-");
    }

    #[test]
    fn renders_text_and_background() {
        let mut plan = a4();
        let mut para = PlacedBox::new(10.0, 10.0, 200.0, 20.0);
        para.text = Some(TextContent {
            lines: vec![TextLine {
                text: "\u{201C}Quoted\u{201D} \u{2013} caf\u{e9}".into(),
                x_offset: 0.0,
                y_offset: 0.0,
                width: 120.0,
            }],
            font_size: 12.0,
            bold: true,
            italic: false,
            color: [0.0, 0.0, 0.0, 1.0],
            line_height: 14.0,
            underline: true,
            list_marker: Some("1.".into()),
        });
        let mut panel = PlacedBox::new(0.0, 0.0, 300.0, 100.0);
        panel.background_color = Some([0.9, 0.9, 0.9, 1.0]);
        panel.children.push(para);
        plan.pages.push(PlannedPage {
            page_index: 0,
            boxes: vec![panel],
        });
        let bytes = render_pdf(&plan).expect("render");
        assert!(bytes.len() > 200);
    }

    #[test]
    fn builtin_text_is_ascii() {
        assert_eq!(to_builtin_text("\u{2018}a\u{2019} \u{2014} \u{e9}"), "'a' - ?");
    }

    #[test]
    fn data_uri_decoding() {
        assert_eq!(decode_data_uri("data:text/plain;base64,aGk=").expect("ok"), b"hi");
        assert!(decode_data_uri("https://example.com/a.png").is_err());
        assert!(decode_data_uri("data:text/plain,hi").is_err());
    }

    #[test]
    fn undecodable_images_are_skipped() {
        let mut plan = a4();
        let mut b = PlacedBox::new(0.0, 0.0, 10.0, 10.0);
        b.image = Some(crate::page_plan::ImageContent {
            src: "data:image/png;base64,AAAA".into(),
            width: 10.0,
            height: 10.0,
        });
        plan.pages.push(PlannedPage {
            page_index: 0,
            boxes: vec![b],
        });
        assert!(render_pdf(&plan).is_ok());
    }
}
