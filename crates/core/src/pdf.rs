//! Archival protocol PDF rendering.
//!
//! Renders a handover or return protocol as a PDF/A-2b-profiled
//! document: a cover page with vehicle, customer and rental details,
//! followed by photo pages (four embedded JPEGs per page, grouped by
//! category), an optional notes page, and a closing signature page
//! when a signature was captured. The renderer is pure: it
//! takes already-downloaded image bytes and returns PDF bytes, leaving
//! storage to the caller.

use base64::Engine as _;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, ProtocolType, Timestamp};

// A4 in points.
const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 50.0;

const PHOTOS_PER_PAGE: usize = 4;
const PHOTO_BOX_WIDTH: f64 = 230.0;
const PHOTO_BOX_HEIGHT: f64 = 170.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoCategory {
    Exterior,
    Interior,
    Damage,
    Fuel,
    Other,
}

impl PhotoCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exterior => "Exterior",
            Self::Interior => "Interior",
            Self::Damage => "Damage",
            Self::Fuel => "Fuel",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub vin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalInfo {
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub start_km: i64,
    pub end_km: Option<i64>,
    pub location: String,
}

/// One photo to embed, already fetched and already in JPEG form.
#[derive(Debug, Clone)]
pub struct EmbeddedPhoto {
    pub photo_id: DbId,
    pub description: String,
    pub category: PhotoCategory,
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct PdfRenderRequest {
    pub protocol_id: DbId,
    pub protocol_type: ProtocolType,
    pub vehicle: VehicleInfo,
    pub customer: CustomerInfo,
    pub rental: RentalInfo,
    pub photos: Vec<EmbeddedPhoto>,
    pub notes: Option<String>,
    /// Either a `data:image/...;base64,` URL or plain signer text.
    pub signature: Option<String>,
    pub generated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check the fields a protocol document cannot be issued without.
/// Reports every missing field at once rather than the first.
pub fn validate_request(req: &PdfRenderRequest) -> Result<(), CoreError> {
    let mut missing = Vec::new();
    if req.vehicle.license_plate.trim().is_empty() {
        missing.push("vehicle.license_plate");
    }
    if req.vehicle.make.trim().is_empty() {
        missing.push("vehicle.make");
    }
    if req.vehicle.model.trim().is_empty() {
        missing.push("vehicle.model");
    }
    if req.customer.first_name.trim().is_empty() {
        missing.push("customer.first_name");
    }
    if req.customer.last_name.trim().is_empty() {
        missing.push("customer.last_name");
    }
    if req.rental.location.trim().is_empty() {
        missing.push("rental.location");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Missing required protocol data: {}",
            missing.join(", ")
        )))
    }
}

/// Expected page count for a document with the given content, without
/// rendering it. Used for upfront progress reporting.
pub fn estimate_page_count(photo_count: usize, has_notes: bool, has_signature: bool) -> usize {
    1 + photo_count.div_ceil(PHOTOS_PER_PAGE) + usize::from(has_notes) + usize::from(has_signature)
}

/// Render the full protocol document.
pub fn render(req: &PdfRenderRequest) -> Result<RenderedPdf, CoreError> {
    validate_request(req)?;

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut kids: Vec<Object> = Vec::new();

    kids.push(cover_page(&mut doc, pages_id, regular_id, bold_id, req)?.into());

    let mut photos = req.photos.clone();
    photos.sort_by_key(|p| p.category);
    for chunk in photos.chunks(PHOTOS_PER_PAGE) {
        kids.push(photo_page(&mut doc, pages_id, regular_id, bold_id, chunk)?.into());
    }

    if let Some(notes) = &req.notes {
        kids.push(notes_page(&mut doc, pages_id, regular_id, bold_id, notes).into());
    }

    if req.signature.is_some() {
        kids.push(signature_page(&mut doc, pages_id, regular_id, bold_id, req)?.into());
    }

    let page_count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let metadata_id = xmp_metadata(&mut doc, req);
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Metadata" => metadata_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(format!(
            "FleetDoc {} Protocol {}",
            match req.protocol_type {
                ProtocolType::Handover => "Handover",
                ProtocolType::Return => "Return",
            },
            req.protocol_id
        )),
        "Author" => Object::string_literal("FleetDoc System"),
        "Creator" => Object::string_literal("FleetDoc Protocol V2"),
        "Producer" => Object::string_literal("FleetDoc Archival Renderer"),
    });
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| CoreError::Pdf(format!("pdf serialization failed: {e}")))?;

    Ok(RenderedPdf { bytes, page_count })
}

/// Structural archival-profile check: parseable document, catalog
/// present, XMP metadata attached. Metadata absence is a warning, not
/// an error.
pub fn validate_archival(bytes: &[u8]) -> ArchivalReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !bytes.starts_with(b"%PDF-") {
        errors.push("invalid PDF header".to_string());
    }

    match Document::load_mem(bytes) {
        Ok(doc) => match doc.catalog() {
            Ok(catalog) => {
                if catalog.get(b"Metadata").is_err() {
                    warnings.push("document catalog has no XMP metadata stream".to_string());
                }
            }
            Err(_) => errors.push("document catalog not found".to_string()),
        },
        Err(e) => errors.push(format!("document structure unreadable: {e}")),
    }

    ArchivalReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Re-save the document with stream compression applied.
pub fn optimize(bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut doc = Document::load_mem(bytes)
        .map_err(|e| CoreError::Pdf(format!("pdf parse failed: {e}")))?;
    doc.compress();
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| CoreError::Pdf(format!("pdf serialization failed: {e}")))?;
    Ok(out)
}

/// First-page raster preview. Not wired up to a rasterizer.
pub fn preview(_bytes: &[u8]) -> Result<Vec<u8>, CoreError> {
    Err(CoreError::Pdf(
        "pdf preview rendering is not implemented".into(),
    ))
}

// ---- page assembly ----------------------------------------------------

/// Small builder for text-and-line content streams.
struct ContentOps {
    ops: String,
}

impl ContentOps {
    fn new() -> Self {
        Self { ops: String::new() }
    }

    fn text(&mut self, font: &str, size: u32, x: f64, y: f64, s: &str) {
        self.ops.push_str(&format!(
            "BT /{font} {size} Tf {x:.1} {y:.1} Td ({}) Tj ET\n",
            escape_pdf_string(s)
        ));
    }

    fn rule(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.ops
            .push_str(&format!("{x1:.1} {y1:.1} m {x2:.1} {y2:.1} l S\n"));
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops
            .push_str(&format!("{x:.1} {y:.1} {w:.1} {h:.1} re S\n"));
    }

    fn image(&mut self, name: &str, x: f64, y: f64, w: f64, h: f64) {
        self.ops
            .push_str(&format!("q {w:.1} 0 0 {h:.1} {x:.1} {y:.1} cm /{name} Do Q\n"));
    }

    fn finish(self) -> Vec<u8> {
        self.ops.into_bytes()
    }
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => " ".to_string(),
        })
        .collect()
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    regular_id: ObjectId,
    bold_id: ObjectId,
    content: Vec<u8>,
    xobjects: Vec<(String, ObjectId)>,
) -> ObjectId {
    let mut resources = dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    };
    if !xobjects.is_empty() {
        let mut xobject_dict = lopdf::Dictionary::new();
        for (name, id) in xobjects {
            xobject_dict.set(name.into_bytes(), id);
        }
        resources.set("XObject", xobject_dict);
    }
    let resources_id = doc.add_object(resources);
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content)));

    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            (PAGE_WIDTH as i64).into(),
            (PAGE_HEIGHT as i64).into(),
        ],
        "Resources" => resources_id,
        "Contents" => content_id,
    })
}

fn cover_page(
    doc: &mut Document,
    pages_id: ObjectId,
    regular_id: ObjectId,
    bold_id: ObjectId,
    req: &PdfRenderRequest,
) -> Result<ObjectId, CoreError> {
    let mut ops = ContentOps::new();

    let title = match req.protocol_type {
        ProtocolType::Handover => "VEHICLE HANDOVER PROTOCOL",
        ProtocolType::Return => "VEHICLE RETURN PROTOCOL",
    };

    let mut y = PAGE_HEIGHT - MARGIN - 20.0;
    ops.text("F2", 20, MARGIN, y, "FLEETDOC");
    y -= 30.0;
    ops.text("F2", 16, MARGIN, y, title);
    y -= 28.0;
    ops.text("F1", 12, MARGIN, y, &format!("Protocol ID: {}", req.protocol_id));
    y -= 18.0;
    ops.text(
        "F1",
        12,
        MARGIN,
        y,
        &format!("Created: {}", req.generated_at.format("%Y-%m-%d %H:%M UTC")),
    );
    y -= 16.0;
    ops.rule(MARGIN, y, PAGE_WIDTH - MARGIN, y);

    // Vehicle section.
    y -= 32.0;
    ops.text("F2", 14, MARGIN, y, "VEHICLE");
    y -= 22.0;
    ops.text(
        "F1",
        11,
        MARGIN,
        y,
        &format!(
            "Plate: {}   Make: {}   Model: {}",
            req.vehicle.license_plate, req.vehicle.make, req.vehicle.model
        ),
    );
    y -= 18.0;
    let mut vehicle_line = format!("Year: {}", req.vehicle.year);
    if let Some(vin) = &req.vehicle.vin {
        vehicle_line.push_str(&format!("   VIN: {vin}"));
    }
    ops.text("F1", 11, MARGIN, y, &vehicle_line);

    // Customer section.
    y -= 34.0;
    ops.text("F2", 14, MARGIN, y, "CUSTOMER");
    y -= 22.0;
    ops.text(
        "F1",
        11,
        MARGIN,
        y,
        &format!(
            "Name: {} {}   Email: {}",
            req.customer.first_name, req.customer.last_name, req.customer.email
        ),
    );
    if let Some(phone) = &req.customer.phone {
        y -= 18.0;
        ops.text("F1", 11, MARGIN, y, &format!("Phone: {phone}"));
    }

    // Rental section.
    y -= 34.0;
    ops.text("F2", 14, MARGIN, y, "RENTAL");
    y -= 22.0;
    ops.text(
        "F1",
        11,
        MARGIN,
        y,
        &format!(
            "From: {}   To: {}   Location: {}",
            req.rental.start_date.format("%Y-%m-%d"),
            req.rental.end_date.format("%Y-%m-%d"),
            req.rental.location
        ),
    );
    y -= 18.0;
    let mut km_line = format!("Start odometer: {} km", req.rental.start_km);
    if let Some(end_km) = req.rental.end_km {
        km_line.push_str(&format!(
            "   End odometer: {} km   Driven: {} km",
            end_km,
            end_km - req.rental.start_km
        ));
    }
    ops.text("F1", 11, MARGIN, y, &km_line);

    Ok(add_page(doc, pages_id, regular_id, bold_id, ops.finish(), Vec::new()))
}

/// Always the final page of the document.
fn signature_page(
    doc: &mut Document,
    pages_id: ObjectId,
    regular_id: ObjectId,
    bold_id: ObjectId,
    req: &PdfRenderRequest,
) -> Result<ObjectId, CoreError> {
    let mut ops = ContentOps::new();
    let mut xobjects = Vec::new();

    let mut y = PAGE_HEIGHT - MARGIN - 14.0;
    ops.text("F2", 14, MARGIN, y, "CUSTOMER SIGNATURE");
    y -= 88.0;
    if let Some(signature) = &req.signature {
        match decode_signature_image(signature) {
            Some(jpeg) => {
                let (w, h) = jpeg_dimensions(&jpeg)?;
                let scale = (200.0 / w as f64).min(80.0 / h as f64).min(1.0);
                let image_id = add_jpeg_xobject(doc, &jpeg, w, h);
                xobjects.push(("Sig".to_string(), image_id));
                ops.image("Sig", MARGIN, y, w as f64 * scale, h as f64 * scale);
            }
            None => {
                ops.text("F1", 11, MARGIN, y + 60.0, &format!("Signed: {signature}"));
            }
        }
    }
    y -= 24.0;
    ops.text(
        "F1",
        10,
        MARGIN,
        y,
        &format!("Signed at: {}", req.generated_at.format("%Y-%m-%d %H:%M UTC")),
    );

    Ok(add_page(doc, pages_id, regular_id, bold_id, ops.finish(), xobjects))
}

fn photo_page(
    doc: &mut Document,
    pages_id: ObjectId,
    regular_id: ObjectId,
    bold_id: ObjectId,
    photos: &[EmbeddedPhoto],
) -> Result<ObjectId, CoreError> {
    let mut ops = ContentOps::new();
    let mut xobjects = Vec::new();

    let top = PAGE_HEIGHT - MARGIN - 14.0;
    ops.text("F2", 14, MARGIN, top, "DOCUMENTATION PHOTOS");

    let grid_top = top - 30.0;
    let gap = 25.0;

    for (i, photo) in photos.iter().enumerate() {
        let col = (i % 2) as f64;
        let row = (i / 2) as f64;
        let x = MARGIN + col * (PHOTO_BOX_WIDTH + gap);
        // Box origin is its lower-left corner.
        let box_top = grid_top - row * (PHOTO_BOX_HEIGHT + 60.0);
        let box_bottom = box_top - PHOTO_BOX_HEIGHT;

        let scale = (PHOTO_BOX_WIDTH / photo.width as f64)
            .min(PHOTO_BOX_HEIGHT / photo.height as f64)
            .min(1.0);
        let draw_w = photo.width as f64 * scale;
        let draw_h = photo.height as f64 * scale;
        let draw_x = x + (PHOTO_BOX_WIDTH - draw_w) / 2.0;
        let draw_y = box_bottom + (PHOTO_BOX_HEIGHT - draw_h) / 2.0;

        if photo.jpeg.is_empty() {
            // Unavailable rendition: keep the slot with a placeholder.
            ops.rect(x, box_bottom, PHOTO_BOX_WIDTH, PHOTO_BOX_HEIGHT);
            ops.text(
                "F1",
                10,
                x + 10.0,
                box_bottom + PHOTO_BOX_HEIGHT / 2.0,
                "Image unavailable",
            );
        } else {
            let name = format!("Im{i}");
            let image_id = add_jpeg_xobject(doc, &photo.jpeg, photo.width, photo.height);
            xobjects.push((name.clone(), image_id));
            ops.image(&name, draw_x, draw_y, draw_w, draw_h);
        }

        ops.text(
            "F1",
            9,
            x,
            box_bottom - 14.0,
            &format!("[{}] {}", photo.category.label(), photo.description),
        );
    }

    Ok(add_page(doc, pages_id, regular_id, bold_id, ops.finish(), xobjects))
}

fn notes_page(
    doc: &mut Document,
    pages_id: ObjectId,
    regular_id: ObjectId,
    bold_id: ObjectId,
    notes: &str,
) -> ObjectId {
    let mut ops = ContentOps::new();
    let mut y = PAGE_HEIGHT - MARGIN - 14.0;
    ops.text("F2", 14, MARGIN, y, "NOTES");
    y -= 26.0;
    for line in wrap_text(notes, 90) {
        ops.text("F1", 11, MARGIN, y, &line);
        y -= 16.0;
        if y < MARGIN {
            break;
        }
    }
    add_page(doc, pages_id, regular_id, bold_id, ops.finish(), Vec::new())
}

/// Embed baseline JPEG bytes directly as a DCTDecode image XObject.
/// The stream must not be deflated again on save.
fn add_jpeg_xobject(doc: &mut Document, jpeg: &[u8], width: u32, height: u32) -> ObjectId {
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    );
    stream.allows_compression = false;
    doc.add_object(Object::Stream(stream))
}

/// Accepts `data:image/...;base64,` URLs; anything else is treated as a
/// text signature. Non-JPEG signature images are transcoded.
fn decode_signature_image(signature: &str) -> Option<Vec<u8>> {
    let rest = signature.strip_prefix("data:image/")?;
    let (_, b64) = rest.split_once(";base64,")?;
    let raw = base64::engine::general_purpose::STANDARD.decode(b64).ok()?;
    let img = image::load_from_memory(&raw).ok()?;
    let mut out = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 85);
    image::DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .ok()?;
    Some(out.into_inner())
}

fn jpeg_dimensions(jpeg: &[u8]) -> Result<(u32, u32), CoreError> {
    let img = image::load_from_memory(jpeg)
        .map_err(|e| CoreError::Pdf(format!("signature image decode failed: {e}")))?;
    Ok((img.width(), img.height()))
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.len() + word.len() + 1 > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

fn xmp_metadata(doc: &mut Document, req: &PdfRenderRequest) -> ObjectId {
    let xmp = format!(
        r#"<?xpacket begin="" id="W5M0MpCehiHzreSzNTczkc9d"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:pdfaid="http://www.aiim.org/pdfa/ns/id/"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:xmp="http://ns.adobe.com/xap/1.0/">
   <pdfaid:part>2</pdfaid:part>
   <pdfaid:conformance>B</pdfaid:conformance>
   <dc:title><rdf:Alt><rdf:li xml:lang="x-default">FleetDoc Protocol {}</rdf:li></rdf:Alt></dc:title>
   <xmp:CreatorTool>FleetDoc Protocol V2</xmp:CreatorTool>
   <xmp:CreateDate>{}</xmp:CreateDate>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
<?xpacket end="w"?>"#,
        req.protocol_id,
        req.generated_at.to_rfc3339(),
    );

    // XMP must stay readable by metadata scanners, so never deflate it.
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "Metadata",
            "Subtype" => "XML",
        },
        xmp.into_bytes(),
    );
    stream.allows_compression = false;
    doc.add_object(Object::Stream(stream))
}
