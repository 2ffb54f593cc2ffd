/// Quote PDF rendering
///
/// Rendering is split into a pure layout pass that places text runs on A4
/// pages and a thin `printpdf` pass that writes them with the builtin
/// Helvetica fonts. Long item tables and terms continue on new pages; the
/// table header is repeated on each continuation page.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};

use crate::models::quote::QuoteDetail;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const TOP: f32 = PAGE_HEIGHT - MARGIN;
const BOTTOM: f32 = MARGIN + 10.0;

const COL_DESCRIPTION: f32 = MARGIN;
const COL_QUANTITY: f32 = 112.0;
const COL_UNIT_PRICE: f32 = 130.0;
const COL_DISCOUNT: f32 = 155.0;
const COL_TOTAL: f32 = 174.0;

const DESCRIPTION_CHARS: usize = 52;
const WRAP_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("Failed to render PDF: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub bold: bool,
    pub text: String,
}

struct Layout {
    pages: Vec<Vec<TextRun>>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: TOP,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = TOP;
    }

    /// Starts a new page when fewer than `height` mm remain
    fn reserve(&mut self, height: f32) -> bool {
        if self.y - height < BOTTOM {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn put(&mut self, x: f32, size: f32, bold: bool, text: impl Into<String>) {
        let y = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.push(TextRun {
                x,
                y,
                size,
                bold,
                text: text.into(),
            });
        }
    }

    fn line(&mut self, x: f32, size: f32, bold: bool, text: impl Into<String>) {
        let height = size * 0.5;
        self.reserve(height);
        self.put(x, size, bold, text);
        self.y -= height;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

/// Greedy word wrap on character count
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }

    lines
}

fn table_header(layout: &mut Layout) {
    layout.put(COL_DESCRIPTION, 9.0, true, "Description");
    layout.put(COL_QUANTITY, 9.0, true, "Qty");
    layout.put(COL_UNIT_PRICE, 9.0, true, "Unit price");
    layout.put(COL_DISCOUNT, 9.0, true, "Disc %");
    layout.put(COL_TOTAL, 9.0, true, "Total");
    layout.y -= 6.0;
}

/// Places every text run of the quote document, one `Vec` per page
pub fn layout(detail: &QuoteDetail, company_name: &str) -> Vec<Vec<TextRun>> {
    let quote = &detail.quote;
    let mut layout = Layout::new();

    layout.line(MARGIN, 18.0, true, company_name);
    layout.gap(2.0);
    layout.line(MARGIN, 14.0, true, format!("Quote {}", quote.quote_number));
    layout.line(MARGIN, 11.0, false, quote.title.clone());
    layout.gap(3.0);

    layout.line(MARGIN, 10.0, false, format!("Date: {}", quote.created_at.format("%Y-%m-%d")));
    if let Some(valid_until) = quote.valid_until {
        layout.line(MARGIN, 10.0, false, format!("Valid until: {}", valid_until.format("%Y-%m-%d")));
    }
    layout.line(MARGIN, 10.0, false, format!("Status: {}", quote.status.as_str()));
    if let Some(account) = &quote.account_name {
        layout.line(MARGIN, 10.0, false, format!("Customer: {}", account));
    }
    if let Some(contact) = quote.contact_name.as_deref().filter(|c| !c.is_empty()) {
        layout.line(MARGIN, 10.0, false, format!("Attention: {}", contact));
    }
    if let Some(owner) = &quote.owner_name {
        layout.line(MARGIN, 10.0, false, format!("Prepared by: {}", owner));
    }
    layout.gap(6.0);

    layout.reserve(12.0);
    table_header(&mut layout);

    for item in &detail.items {
        if layout.reserve(5.0) {
            table_header(&mut layout);
        }
        layout.put(COL_DESCRIPTION, 9.0, false, truncate(&item.description, DESCRIPTION_CHARS));
        layout.put(COL_QUANTITY, 9.0, false, format!("{}", item.quantity));
        layout.put(COL_UNIT_PRICE, 9.0, false, money(item.unit_price));
        layout.put(COL_DISCOUNT, 9.0, false, format!("{}", item.discount_percent));
        layout.put(COL_TOTAL, 9.0, false, money(item.line_total));
        layout.y -= 5.0;
    }
    layout.gap(4.0);

    layout.reserve(24.0);
    for (label, value, bold) in [
        ("Subtotal", quote.subtotal, false),
        ("Discount", -quote.discount_amount, false),
        ("Tax", quote.tax_amount, false),
        ("Total", quote.total, true),
    ] {
        layout.put(COL_DISCOUNT - 10.0, 10.0, bold, label);
        layout.put(COL_TOTAL, 10.0, bold, money(value));
        layout.y -= 5.5;
    }

    if !detail.terms.is_empty() {
        layout.gap(6.0);
        layout.line(MARGIN, 12.0, true, "Terms and conditions");
        for term in &detail.terms {
            layout.gap(1.5);
            layout.line(MARGIN, 10.0, true, term.title.clone());
            for line in wrap(&term.content, WRAP_CHARS) {
                layout.line(MARGIN, 9.0, false, line);
            }
        }
    }

    if let Some(notes) = quote.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        layout.gap(6.0);
        layout.line(MARGIN, 12.0, true, "Notes");
        for line in wrap(notes, WRAP_CHARS) {
            layout.line(MARGIN, 9.0, false, line);
        }
    }

    layout.pages
}

/// Renders the quote as PDF bytes
pub fn render(detail: &QuoteDetail, company_name: &str) -> Result<Vec<u8>, PdfError> {
    let pages = layout(detail, company_name);
    let title = format!("Quote {}", detail.quote.quote_number);

    let (doc, first_page, first_layer) =
        PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| PdfError::Render(format!("{:?}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| PdfError::Render(format!("{:?}", e)))?;

    for (index, runs) in pages.iter().enumerate() {
        let (page, layer) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1")
        };
        let layer = doc.get_page(page).get_layer(layer);

        for run in runs {
            let font: &IndirectFontRef = if run.bold { &bold } else { &regular };
            layer.use_text(run.text.clone(), run.size, Mm(run.x), Mm(run.y), font);
        }

        let footer = format!("Page {} of {}", index + 1, pages.len());
        layer.use_text(footer, 8.0, Mm(PAGE_WIDTH - MARGIN - 22.0), Mm(MARGIN), &regular);
    }

    doc.save_to_bytes()
        .map_err(|e| PdfError::Render(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quote::{Quote, QuoteLineItem, QuoteStatus, QuoteTerm};
    use chrono::Utc;
    use uuid::Uuid;

    fn detail(item_count: usize) -> QuoteDetail {
        let quote_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let items = (0..item_count)
            .map(|i| QuoteLineItem {
                id: Uuid::new_v4(),
                quote_id,
                product_id: None,
                description: format!("Item {}", i),
                quantity: 1.0,
                unit_price: 10.0,
                discount_percent: 0.0,
                tax_rate: 0.0,
                line_total: 10.0,
                sort_order: i as i32,
            })
            .collect();

        QuoteDetail {
            quote: Quote {
                id: quote_id,
                tenant_id,
                quote_number: "Q-2025-00001".to_string(),
                title: "Annual licence".to_string(),
                deal_id: None,
                account_id: None,
                contact_id: None,
                status: QuoteStatus::Draft,
                valid_until: None,
                subtotal: 10.0 * item_count as f64,
                discount_amount: 0.0,
                tax_amount: 0.0,
                total: 10.0 * item_count as f64,
                notes: Some("Prices in EUR.".to_string()),
                owner_id: None,
                account_name: Some("Acme".to_string()),
                contact_name: None,
                deal_name: None,
                owner_name: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            items,
            terms: vec![QuoteTerm {
                id: Uuid::new_v4(),
                tenant_id,
                title: "Payment".to_string(),
                content: "Net 30 days.".to_string(),
                is_default: true,
                sort_order: 0,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }],
        }
    }

    fn texts(pages: &[Vec<TextRun>]) -> Vec<&str> {
        pages.iter().flatten().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_short_quote_fits_one_page() {
        let pages = layout(&detail(3), "Example Ltd");
        assert_eq!(pages.len(), 1);

        let texts = texts(&pages);
        assert!(texts.contains(&"Quote Q-2025-00001"));
        assert!(texts.contains(&"Customer: Acme"));
        assert!(texts.contains(&"30.00"));
        assert!(texts.contains(&"Net 30 days."));
        assert!(texts.contains(&"Prices in EUR."));
    }

    #[test]
    fn test_long_item_list_paginates_with_repeated_header() {
        let pages = layout(&detail(120), "Example Ltd");
        assert!(pages.len() > 1);

        for page in &pages {
            for run in page {
                assert!(run.y >= BOTTOM - 6.0, "run below margin: {:?}", run);
                assert!(run.y <= TOP);
            }
        }

        let headers = texts(&pages).iter().filter(|t| **t == "Description").count();
        assert!(headers >= 2);
        assert!(texts(&pages).contains(&"Item 119"));
    }

    #[test]
    fn test_wrap_and_truncate() {
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
        assert_eq!(truncate("abcdef", 5), "ab...");
        assert_eq!(truncate("abc", 5), "abc");
    }

    #[test]
    fn test_render_produces_pdf_bytes() {
        let bytes = render(&detail(2), "Example Ltd").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
