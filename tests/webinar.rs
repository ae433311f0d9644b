mod common;

use certmaker::db::NewTemplate;
use certmaker::form::validate_submission;
use certmaker::layout::{cover_crop, lay_out, HorizontalAnchor, A4_LANDSCAPE};
use certmaker::pdf::{render_certificate, PdfError};
use certmaker::schema::{Field, FieldId, FieldValues, TemplateMeta};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

#[tokio::test]
async fn test_webinar_certificate_end_to_end() {
    let (state, _dir) = common::app_state();

    let background_url = state
        .storage
        .upload("webinar.png", &common::png(1000, 700))
        .await
        .unwrap();
    let template = state
        .store
        .insert_template(NewTemplate {
            meta: TemplateMeta {
                name: "Webinar".into(),
                slug: Some("webinar".into()),
                background_url,
            },
            created_by: "admin".into(),
        })
        .await
        .unwrap();

    let mut name = Field::draft(FieldId::Draft(1), "Name", 500.0, 350.0);
    name.is_center_x = true;
    name.font_size = 24;
    state
        .store
        .replace_fields(template.id, vec![name])
        .await
        .unwrap();

    // The public form resolves the alias and validates the submission.
    let found = state
        .store
        .find_template_by_slug("webinar")
        .await
        .unwrap()
        .unwrap();
    let fields = state.store.list_fields(found.id).await.unwrap();
    let mut raw = FieldValues::new();
    raw.insert("Name".into(), "Jane Doe".into());
    let values = validate_submission(&fields, &raw).unwrap();
    let submission = state.store.insert_submission(found.id, values).await.unwrap();

    let layout = lay_out(&found.background_url, &fields, &submission.values);
    assert_eq!(layout.page, A4_LANDSCAPE);
    assert_eq!(layout.placements.len(), 1);
    let placement = &layout.placements[0];
    assert_eq!(placement.text, "Jane Doe");
    assert_eq!(placement.top, 350.0);
    assert_eq!(placement.anchor, HorizontalAnchor::PageCenter);

    let text_width = 110.0;
    let left = placement.anchor.origin_x(layout.page.width, text_width);
    assert!((left + text_width / 2.0 - layout.page.width / 2.0).abs() < 1e-9);

    let crop = cover_crop(1000, 700, layout.page);
    assert_eq!((crop.width, crop.height), (990, 700));

    let background = state.storage.fetch(&found.background_url).await.unwrap();
    let font_dir = std::env::var_os("FONT_DIR").map(PathBuf::from);
    let pdf = match render_certificate(&layout, Some(background.as_slice()), font_dir.as_deref()) {
        Ok(pdf) => pdf,
        Err(PdfError::NoFont) => {
            panic!("no font found: install fonts-dejavu or fonts-liberation, or set FONT_DIR")
        }
        Err(e) => panic!("rendering failed: {}", e),
    };
    assert!(pdf.starts_with(b"%PDF"));
    assert!(
        pdf.windows(b"/Image".len()).any(|w| w == b"/Image"),
        "background image is embedded"
    );

    assert_eq!(state.store.list_submissions(found.id).await.unwrap().len(), 1);
    assert_eq!(found.download_name("Certificate.pdf"), "Webinar_Certificate.pdf");
}
