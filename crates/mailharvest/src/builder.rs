//! Seams to the downstream invoice and IDOC document builders.
//!
//! The pipeline yields [`ExtractionRecord`]s; what gets built from them
//! is opaque to this crate.

use std::path::PathBuf;

use crate::pipeline::ExtractionRecord;

/// Paths to the three IDOC segment templates, passed through to the
/// document builder for every record.
#[derive(Debug, Clone)]
pub struct SegmentTemplates {
    pub start_segment: PathBuf,
    pub dynamic_segment: PathBuf,
    pub end_segment: PathBuf,
}

/// Builds one downstream invoice object from an extraction record.
pub trait InvoiceBuilder {
    type Invoice;

    fn build(&self, record: &ExtractionRecord) -> Self::Invoice;
}

/// Builds one downstream IDOC document from the segment templates.
pub trait IdocBuilder {
    type Idoc;

    fn build(&self, templates: &SegmentTemplates) -> Self::Idoc;
}

/// Pairs every record with its invoice and IDOC documents, in record
/// order.
pub fn build_documents<'a, I, D>(
    records: &'a [ExtractionRecord],
    invoices: &'a I,
    idocs: &'a D,
    templates: &'a SegmentTemplates,
) -> impl Iterator<Item = (I::Invoice, D::Idoc)> + 'a
where
    I: InvoiceBuilder,
    D: IdocBuilder,
{
    records
        .iter()
        .map(move |record| (invoices.build(record), idocs.build(templates)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct UidInvoices;

    impl InvoiceBuilder for UidInvoices {
        type Invoice = (u32, bool);

        fn build(&self, record: &ExtractionRecord) -> Self::Invoice {
            (record.uid, record.attachment.is_some())
        }
    }

    struct TemplateIdocs;

    impl IdocBuilder for TemplateIdocs {
        type Idoc = PathBuf;

        fn build(&self, templates: &SegmentTemplates) -> Self::Idoc {
            templates.start_segment.clone()
        }
    }

    fn record(uid: u32) -> ExtractionRecord {
        ExtractionRecord {
            uid,
            sender: "a@b.example".to_string(),
            business: Some("b".to_string()),
            subject: "s".to_string(),
            body_text: String::new(),
            raw: Arc::from(&b"raw"[..]),
            attachment: None,
        }
    }

    #[test]
    fn test_one_pair_per_record() {
        let records = vec![record(1), record(2)];
        let templates = SegmentTemplates {
            start_segment: PathBuf::from("start.seg"),
            dynamic_segment: PathBuf::from("dyn.seg"),
            end_segment: PathBuf::from("end.seg"),
        };

        let pairs: Vec<_> =
            build_documents(&records, &UidInvoices, &TemplateIdocs, &templates).collect();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, (1, false));
        assert_eq!(pairs[1].0, (2, false));
        assert_eq!(pairs[0].1, PathBuf::from("start.seg"));
    }
}
