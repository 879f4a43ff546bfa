//! PDF assembly: one JPEG image per page via `lopdf`.
//!
//! Each page owns a single `/DCTDecode` image XObject named `/Im0` and a
//! four-operator content stream (`q`, `cm`, `Do`, `Q`) that scales the unit
//! image square to the [`Placement`] box. The page tree is written last, in
//! `finish`, so pages appear in exactly the order they were added.

use crate::config::PageGeometry;
use crate::error::Photo2PdfError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::layout::Placement;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

const IMAGE_NAME: &str = "Im0";

/// Incrementally built image-per-page PDF document.
pub struct PdfComposer {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    geometry: PageGeometry,
}

impl PdfComposer {
    pub fn new(geometry: PageGeometry) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            geometry,
        }
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append one page showing `image` at `placement`.
    pub fn add_image_page(
        &mut self,
        image: &EncodedImage,
        placement: &Placement,
    ) -> Result<(), Photo2PdfError> {
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => image.color_space.pdf_name(),
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            image.data.clone(),
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(placement.width),
                        real(0.0),
                        real(0.0),
                        real(placement.height),
                        real(placement.x),
                        real(placement.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| Photo2PdfError::DocumentBuild(format!("content stream: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                real(0.0),
                real(0.0),
                real(self.geometry.page_width),
                real(self.geometry.page_height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    IMAGE_NAME => image_id,
                },
            },
        });
        self.page_ids.push(page_id);

        debug!(
            "Added page {} ({}x{} px at {:.1},{:.1} size {:.1}x{:.1} pt)",
            self.page_ids.len(),
            image.width,
            image.height,
            placement.x,
            placement.y,
            placement.width,
            placement.height
        );
        Ok(())
    }

    /// Write the page tree, catalog, and info dictionary; serialise to bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, Photo2PdfError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        let count = self.page_ids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let created = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("photo2pdf ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(created),
        });
        self.doc.trailer.set("Info", info_id);

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| Photo2PdfError::DocumentBuild(e.to_string()))?;
        Ok(buf)
    }
}

fn real(v: f64) -> Object {
    Object::from(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::encode_jpeg;
    use crate::pipeline::layout::fit_and_center;
    use image::{DynamicImage, Rgb, RgbImage};

    fn page_for(w: u32, h: u32, composer: &mut PdfComposer) {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
        let enc = encode_jpeg(&img, 95).unwrap();
        let placement = fit_and_center(enc.width, enc.height, &PageGeometry::default());
        composer.add_image_page(&enc, &placement).unwrap();
    }

    #[test]
    fn pages_are_written_in_order() {
        let mut composer = PdfComposer::new(PageGeometry::default());
        page_for(80, 60, &mut composer);
        page_for(60, 80, &mut composer);
        page_for(50, 50, &mut composer);
        assert_eq!(composer.page_count(), 3);

        let bytes = composer.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).expect("output parses");
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);

        // Each page's image XObject keeps the source pixel size.
        let widths: Vec<i64> = pages
            .values()
            .map(|&page_id| {
                let page = doc.get_dictionary(page_id).unwrap();
                let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
                let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
                let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
                let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
                stream.dict.get(b"Width").unwrap().as_i64().unwrap()
            })
            .collect();
        assert_eq!(widths, vec![80, 60, 50]);
    }

    #[test]
    fn content_stream_places_image_in_margin_box() {
        let mut composer = PdfComposer::new(PageGeometry::default());
        page_for(100, 50, &mut composer);
        let bytes = composer.finish().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let (_, &page_id) = doc.get_pages().iter().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let cm = content
            .operations
            .iter()
            .find(|op| op.operator == "cm")
            .expect("cm operator");
        let nums: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
        assert!((nums[0] - 100.0).abs() < 0.01);
        assert!((nums[3] - 50.0).abs() < 0.01);
        let g = PageGeometry::default();
        assert!((f64::from(nums[4]) - (g.page_width - 100.0) / 2.0).abs() < 0.01);
        assert!((f64::from(nums[5]) - (g.page_height - 50.0) / 2.0).abs() < 0.01);
    }

    #[test]
    fn empty_document_still_serialises() {
        let bytes = PdfComposer::new(PageGeometry::default()).finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().is_empty());
    }
}
