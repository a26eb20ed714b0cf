//! Schema validator for transfer prepare commands
//!
//! Applies the interoperability schema to a request's headers and JSON body
//! and produces either a [`TransferPrepareCommand`] or a [`ValidationError`]
//! listing every violation in declaration order (headers first, then body
//! fields in schema order, then undeclared fields).
//!
//! Headers are matched case-insensitively; undeclared headers are ignored
//! since every HTTP stack adds its own. Undeclared body fields are rejected
//! at every nesting level.
//!
//! The validator is pure: no clock, no I/O, no shared state.

use serde_json::{Map, Value};

use super::rules::{
    check_all, CurrencyCode, HttpDate, IntegerMax, IsoTimestamp, Length, Pattern, StringRule,
    UuidFormat,
};
use crate::contracts::{CommandHeaders, Extension, Money, PrepareHeaders, TransferPrepareCommand};
use crate::error::{ValidationError, Violation, ViolationCode};

/// Largest accepted `content-length` header value (5 MiB)
pub const MAX_CONTENT_LENGTH: u64 = 5_242_880;

/// Largest accepted number of extension entries
pub const MAX_EXTENSIONS: usize = 16;

/// Amount: no leading zeros, at most 18 integer digits, 1 to 3 fraction digits
pub const AMOUNT_PATTERN: &str = r"^(0|[1-9][0-9]{0,17})([.][0-9]{1,3})?$";

const INTEROP_MEDIA_TYPE_PATTERN: &str = r"application/vnd\.interoperability[.]";
const ILP_PACKET_PATTERN: &str = r"^[A-Za-z0-9-_]+[=]{0,2}$";
const CONDITION_PATTERN: &str = r"^[A-Za-z0-9-_]{43}$";

const BODY_FIELDS: &[&str] = &[
    "transferId",
    "payeeFsp",
    "payerFsp",
    "amount",
    "ilpPacket",
    "condition",
    "expiration",
    "extensionList",
];
const AMOUNT_FIELDS: &[&str] = &["currency", "amount"];
const EXTENSION_LIST_FIELDS: &[&str] = &["extension"];
const EXTENSION_FIELDS: &[&str] = &["key", "value"];

/// Validated body fields, before being joined with the headers
struct BodyFields {
    transfer_id: String,
    payee_fsp: String,
    payer_fsp: String,
    amount: Money,
    ilp_packet: String,
    condition: String,
    expiration: String,
    extensions: Vec<Extension>,
}

/// Field-level view over one JSON object
struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    /// Require `value` to be an object, recording a violation otherwise
    fn of(path: String, value: &'a Value, out: &mut Vec<Violation>) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self { path, map }),
            Value::Null => {
                out.push(Violation::new(path, ViolationCode::Required, "is required"));
                None
            }
            _ => {
                out.push(Violation::new(path, ViolationCode::Type, "must be an object"));
                None
            }
        }
    }

    fn child(&self, name: &str) -> String {
        format!("{}.{}", self.path, name)
    }

    fn missing(&self, name: &str, required: bool, out: &mut Vec<Violation>) {
        if required {
            out.push(Violation::new(self.child(name), ViolationCode::Required, "is required"));
        }
    }

    /// String field with rules applied to the raw value
    fn string(
        &self,
        name: &str,
        required: bool,
        rules: &[&dyn StringRule],
        out: &mut Vec<Violation>,
    ) -> Option<&'a str> {
        self.string_with(name, required, |s| s, rules, out)
    }

    /// String field with rules applied after `normalize`
    fn string_with(
        &self,
        name: &str,
        required: bool,
        normalize: impl Fn(&'a str) -> &'a str,
        rules: &[&dyn StringRule],
        out: &mut Vec<Violation>,
    ) -> Option<&'a str> {
        match self.map.get(name) {
            None => {
                self.missing(name, required, out);
                None
            }
            Some(Value::String(raw)) => {
                let value = normalize(raw.as_str());
                match check_all(value, rules) {
                    Ok(()) => Some(value),
                    Err((code, message)) => {
                        out.push(Violation::new(self.child(name), code, message));
                        None
                    }
                }
            }
            Some(_) => {
                out.push(Violation::new(self.child(name), ViolationCode::Type, "must be a string"));
                None
            }
        }
    }

    fn object(&self, name: &str, required: bool, out: &mut Vec<Violation>) -> Option<Fields<'a>> {
        match self.map.get(name) {
            None => {
                self.missing(name, required, out);
                None
            }
            Some(value) => Fields::of(self.child(name), value, out),
        }
    }

    fn reject_unknown(&self, declared: &[&str], out: &mut Vec<Violation>) {
        for key in self.map.keys().filter(|k| !declared.contains(&k.as_str())) {
            out.push(Violation::new(
                self.child(key),
                ViolationCode::UnknownField,
                "is not allowed",
            ));
        }
    }
}

/// Interoperability schema for `POST /transfers`
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    interop_media_type: Pattern,
    http_date: HttpDate,
    content_length: IntegerMax,
    non_empty: Length,
    fsp_id: Length,
    transfer_id: UuidFormat,
    currency: CurrencyCode,
    amount: Pattern,
    ilp_packet_length: Length,
    ilp_packet: Pattern,
    condition: Pattern,
    expiration: IsoTimestamp,
    extension_key: Length,
    extension_value: Length,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            interop_media_type: Pattern::new(
                INTEROP_MEDIA_TYPE_PATTERN,
                "an application/vnd.interoperability.* media type",
            ),
            http_date: HttpDate::new(),
            content_length: IntegerMax(MAX_CONTENT_LENGTH),
            non_empty: Length::between(1, usize::MAX),
            fsp_id: Length::between(1, 32),
            transfer_id: UuidFormat::new(),
            currency: CurrencyCode,
            amount: Pattern::new(
                AMOUNT_PATTERN,
                "a positive decimal with at most 18 integer and 3 fraction digits",
            ),
            ilp_packet_length: Length::between(1, 32_768),
            ilp_packet: Pattern::new(ILP_PACKET_PATTERN, "base64url encoded"),
            condition: Pattern::new(CONDITION_PATTERN, "exactly 43 base64url characters"),
            expiration: IsoTimestamp::new(),
            extension_key: Length::between(1, 32),
            extension_value: Length::between(1, 128),
        }
    }

    /// Validate a prepare request
    ///
    /// Returns the normalized command, or every violation found. Calling this
    /// twice on the same input yields the same result.
    pub fn validate(
        &self,
        headers: &CommandHeaders,
        body: &Value,
    ) -> Result<TransferPrepareCommand, ValidationError> {
        let mut violations = Vec::new();

        let prepare_headers = self.validate_headers(headers, &mut violations);
        let body_fields = self.validate_body(body, &mut violations);

        match (prepare_headers, body_fields) {
            (Some(h), Some(b)) if violations.is_empty() => Ok(TransferPrepareCommand {
                headers: h,
                transfer_id: b.transfer_id,
                payer_fsp: b.payer_fsp,
                payee_fsp: b.payee_fsp,
                amount: b.amount,
                ilp_packet: b.ilp_packet,
                condition: b.condition,
                expiration: b.expiration,
                extensions: b.extensions,
                original_headers: headers.clone(),
                original_body: body.clone(),
            }),
            _ => Err(ValidationError::new(violations)),
        }
    }

    fn header(
        &self,
        headers: &CommandHeaders,
        name: &str,
        required: bool,
        rules: &[&dyn StringRule],
        out: &mut Vec<Violation>,
    ) -> Option<String> {
        let path = format!("headers.{}", name);
        match headers.get(name) {
            None => {
                if required {
                    out.push(Violation::new(path, ViolationCode::Required, "is required"));
                }
                None
            }
            Some(value) => match check_all(value, rules) {
                Ok(()) => Some(value.to_string()),
                Err((code, message)) => {
                    out.push(Violation::new(path, code, message));
                    None
                }
            },
        }
    }

    fn validate_headers(
        &self,
        headers: &CommandHeaders,
        out: &mut Vec<Violation>,
    ) -> Option<PrepareHeaders> {
        let media: [&dyn StringRule; 2] = [&self.non_empty, &self.interop_media_type];
        let text: [&dyn StringRule; 1] = [&self.non_empty];

        let accept = self.header(headers, "accept", false, &media, out);
        let content_type = self.header(headers, "content-type", true, &media, out);
        let content_length = self
            .header(headers, "content-length", false, &[&self.content_length], out)
            .and_then(|v| v.trim().parse::<u64>().ok());
        let date = self.header(headers, "date", true, &[&self.http_date], out);
        let x_forwarded_for = self.header(headers, "x-forwarded-for", false, &text, out);
        let fspiop_source = self.header(headers, "fspiop-source", true, &text, out);
        let fspiop_destination = self.header(headers, "fspiop-destination", false, &text, out);
        let fspiop_encryption = self.header(headers, "fspiop-encryption", false, &text, out);
        let fspiop_signature = self.header(headers, "fspiop-signature", false, &text, out);
        let fspiop_uri = self.header(headers, "fspiop-uri", false, &text, out);
        let fspiop_http_method = self.header(headers, "fspiop-http-method", false, &text, out);

        Some(PrepareHeaders {
            content_type: content_type?,
            date: date?,
            fspiop_source: fspiop_source?,
            accept,
            content_length,
            x_forwarded_for,
            fspiop_destination,
            fspiop_encryption,
            fspiop_signature,
            fspiop_uri,
            fspiop_http_method,
        })
    }

    fn validate_body(&self, body: &Value, out: &mut Vec<Violation>) -> Option<BodyFields> {
        let fields = Fields::of("body".to_string(), body, out)?;

        let transfer_id = fields
            .string("transferId", true, &[&self.transfer_id], out);
        let payee_fsp = fields.string("payeeFsp", true, &[&self.fsp_id], out);
        let payer_fsp = fields.string("payerFsp", true, &[&self.fsp_id], out);
        let amount = fields
            .object("amount", true, out)
            .and_then(|amount| self.validate_amount(&amount, out));
        let ilp_packet =
            fields.string("ilpPacket", true, &[&self.ilp_packet_length, &self.ilp_packet], out);
        let condition = fields.string_with("condition", true, str::trim, &[&self.condition], out);
        let expiration = fields.string("expiration", true, &[&self.expiration], out);
        let extensions = fields
            .object("extensionList", false, out)
            .map(|list| self.validate_extensions(&list, out))
            .unwrap_or_default();

        fields.reject_unknown(BODY_FIELDS, out);

        Some(BodyFields {
            transfer_id: transfer_id?.to_string(),
            payee_fsp: payee_fsp?.to_string(),
            payer_fsp: payer_fsp?.to_string(),
            amount: amount?,
            ilp_packet: ilp_packet?.to_string(),
            condition: condition?.to_string(),
            expiration: expiration?.to_string(),
            extensions,
        })
    }

    fn validate_amount(&self, amount: &Fields<'_>, out: &mut Vec<Violation>) -> Option<Money> {
        let currency = amount.string("currency", true, &[&self.currency], out);
        let value = amount.string("amount", true, &[&self.amount], out);
        amount.reject_unknown(AMOUNT_FIELDS, out);

        Some(Money {
            currency: currency?.to_string(),
            amount: value?.to_string(),
        })
    }

    fn validate_extensions(&self, list: &Fields<'_>, out: &mut Vec<Violation>) -> Vec<Extension> {
        let path = list.child("extension");
        let mut extensions = Vec::new();

        match list.map.get("extension") {
            None => out.push(Violation::new(path.clone(), ViolationCode::Required, "is required")),
            Some(Value::Array(items)) => {
                if items.is_empty() || items.len() > MAX_EXTENSIONS {
                    out.push(Violation::new(
                        path.clone(),
                        ViolationCode::Length,
                        format!("must contain between 1 and {} items", MAX_EXTENSIONS),
                    ));
                }
                for (i, item) in items.iter().enumerate() {
                    let Some(entry) = Fields::of(format!("{}[{}]", path, i), item, out) else {
                        continue;
                    };
                    let key = entry.string("key", true, &[&self.extension_key], out);
                    let value = entry.string("value", true, &[&self.extension_value], out);
                    entry.reject_unknown(EXTENSION_FIELDS, out);
                    if let (Some(key), Some(value)) = (key, value) {
                        extensions.push(Extension {
                            key: key.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
            Some(_) => out.push(Violation::new(path.clone(), ViolationCode::Type, "must be an array")),
        }

        list.reject_unknown(EXTENSION_LIST_FIELDS, out);
        extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRANSFER_ID: &str = "b51ec534-ee48-4575-b6a9-ead2955b8069";
    const CONDITION: &str = "GRzLaTP7DJ9t4P-a_BA0WA9wzzlsugf00-Tn6kESAfM";

    fn headers() -> CommandHeaders {
        CommandHeaders::new()
            .with("Content-Type", "application/vnd.interoperability.transfers+json;version=1.0")
            .with("Date", "Mon, 1 Jan 2024 00:00:00 GMT")
            .with("FSPIOP-Source", "payerA")
            .with("Host", "localhost:3000")
    }

    fn body() -> Value {
        json!({
            "transferId": TRANSFER_ID,
            "payerFsp": "payerA",
            "payeeFsp": "payerB",
            "amount": { "currency": "USD", "amount": "100.00" },
            "ilpPacket": "AYIBYQ",
            "condition": CONDITION,
            "expiration": "2024-01-01T00:05:00.000Z"
        })
    }

    fn reject(headers: &CommandHeaders, body: &Value) -> ValidationError {
        SchemaValidator::new()
            .validate(headers, body)
            .expect_err("command should be rejected")
    }

    #[test]
    fn test_valid_command_is_normalized() {
        let command = SchemaValidator::new().validate(&headers(), &body()).unwrap();

        assert_eq!(command.transfer_id, TRANSFER_ID);
        assert_eq!(command.payer_fsp, "payerA");
        assert_eq!(command.payee_fsp, "payerB");
        assert_eq!(command.amount.currency, "USD");
        assert_eq!(command.amount.amount, "100.00");
        assert_eq!(command.headers.fspiop_source, "payerA");
        assert!(command.extensions.is_empty());
        assert_eq!(command.original_headers.get("host"), Some("localhost:3000"));
        assert_eq!(command.original_body, body());
    }

    #[test]
    fn test_missing_content_type_is_rejected_even_with_valid_body() {
        let headers = CommandHeaders::new()
            .with("date", "Mon, 1 Jan 2024 00:00:00 GMT")
            .with("fspiop-source", "payerA");

        let err = reject(&headers, &body());
        let first = err.first().unwrap();
        assert_eq!(first.path, "headers.content-type");
        assert_eq!(first.code, ViolationCode::Required);
    }

    #[test]
    fn test_missing_date_is_rejected_even_with_valid_body() {
        let headers = CommandHeaders::new()
            .with("content-type", "application/vnd.interoperability.transfers+json")
            .with("fspiop-source", "payerA");

        let err = reject(&headers, &body());
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.first().unwrap().path, "headers.date");
        assert_eq!(err.first().unwrap().code, ViolationCode::Required);
    }

    #[test]
    fn test_missing_fspiop_source_is_rejected_even_with_valid_body() {
        let headers = CommandHeaders::new()
            .with("content-type", "application/vnd.interoperability.transfers+json")
            .with("date", "Mon, 1 Jan 2024 00:00:00 GMT");

        let err = reject(&headers, &body());
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.first().unwrap().path, "headers.fspiop-source");
        assert_eq!(err.first().unwrap().code, ViolationCode::Required);
    }

    #[test]
    fn test_non_ascii_digits_in_expiration_are_rejected() {
        for expiration in [
            "2\u{0660}\u{0662}\u{0664}-01-01T00:05:00.000Z",
            "2024-01-01T00:05:00.\u{0661}\u{0662}\u{0663}Z",
        ] {
            let mut body = body();
            body["expiration"] = json!(expiration);
            let err = reject(&headers(), &body);
            assert_eq!(err.first().unwrap().path, "body.expiration");
            assert_eq!(err.first().unwrap().code, ViolationCode::Format);
        }
    }

    #[test]
    fn test_non_interop_content_type_is_rejected() {
        let headers = headers().with("content-type", "application/json");
        let err = reject(&headers, &body());
        assert_eq!(err.first().unwrap().code, ViolationCode::Pattern);
    }

    #[test]
    fn test_content_length_limit() {
        let ok = headers().with("content-length", "5242880");
        assert!(SchemaValidator::new().validate(&ok, &body()).is_ok());

        let too_big = headers().with("content-length", "5242881");
        let err = reject(&too_big, &body());
        assert_eq!(err.first().unwrap().path, "headers.content-length");
        assert_eq!(err.first().unwrap().code, ViolationCode::Range);
    }

    #[test]
    fn test_condition_of_40_characters_is_rejected() {
        let mut body = body();
        body["condition"] = json!(&CONDITION[..40]);

        let err = reject(&headers(), &body);
        assert!(err.mentions("body.condition"));
        assert_eq!(err.first().unwrap().code, ViolationCode::Pattern);
    }

    #[test]
    fn test_condition_is_trimmed() {
        let mut body = body();
        body["condition"] = json!(format!("  {}\n", CONDITION));

        let command = SchemaValidator::new().validate(&headers(), &body).unwrap();
        assert_eq!(command.condition, CONDITION);
    }

    #[test]
    fn test_amount_patterns() {
        let validator = SchemaValidator::new();
        for ok in ["0", "1", "100.00", "12.345", "0.5", "123456789012345678"] {
            let mut body = body();
            body["amount"]["amount"] = json!(ok);
            assert!(validator.validate(&headers(), &body).is_ok(), "{ok} should pass");
        }
        for bad in ["12.3456", "1.0000", "01", "-1", "1.", ".5", "1e3", "1234567890123456789", ""] {
            let mut body = body();
            body["amount"]["amount"] = json!(bad);
            let err = validator.validate(&headers(), &body).unwrap_err();
            assert_eq!(err.first().unwrap().path, "body.amount.amount", "{bad}");
        }
    }

    #[test]
    fn test_unknown_currency_is_rejected() {
        let mut body = body();
        body["amount"]["currency"] = json!("XYZ");
        let err = reject(&headers(), &body);
        assert_eq!(err.first().unwrap().code, ViolationCode::Currency);
    }

    #[test]
    fn test_unknown_body_fields_are_rejected_at_every_level() {
        let mut body = body();
        body["note"] = json!("hello");
        body["amount"]["fee"] = json!("1");

        let err = reject(&headers(), &body);
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["body.amount.fee", "body.note"]);
        assert!(err.violations().iter().all(|v| v.code == ViolationCode::UnknownField));
    }

    #[test]
    fn test_unknown_headers_are_ignored() {
        let headers = headers().with("user-agent", "curl/8.0").with("x-custom", "1");
        let command = SchemaValidator::new().validate(&headers, &body()).unwrap();
        assert_eq!(command.original_headers.get("x-custom"), Some("1"));
    }

    #[test]
    fn test_extension_list() {
        let mut body = body();
        body["extensionList"] = json!({ "extension": [
            { "key": "purpose", "value": "salary" },
            { "key": "ref", "value": "INV-42" }
        ]});

        let command = SchemaValidator::new().validate(&headers(), &body).unwrap();
        assert_eq!(command.extensions.len(), 2);
        assert_eq!(command.extensions[0].key, "purpose");
    }

    #[test]
    fn test_empty_extension_list_is_rejected() {
        let mut body = body();
        body["extensionList"] = json!({ "extension": [] });

        let err = reject(&headers(), &body);
        assert_eq!(err.first().unwrap().path, "body.extensionList.extension");
        assert_eq!(err.first().unwrap().code, ViolationCode::Length);
    }

    #[test]
    fn test_too_many_extensions_are_rejected() {
        let entries: Vec<_> = (0..17)
            .map(|i| json!({ "key": format!("k{i}"), "value": "v" }))
            .collect();
        let mut body = body();
        body["extensionList"] = json!({ "extension": entries });

        let err = reject(&headers(), &body);
        assert!(err.mentions("body.extensionList.extension"));
    }

    #[test]
    fn test_extension_entry_limits() {
        let mut body = body();
        body["extensionList"] = json!({ "extension": [
            { "key": "k".repeat(33), "value": "v" },
            { "key": "ok", "value": "v".repeat(129) }
        ]});

        let err = reject(&headers(), &body);
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "body.extensionList.extension[0].key",
                "body.extensionList.extension[1].value"
            ]
        );
    }

    #[test]
    fn test_wrong_types_are_reported() {
        let mut body = body();
        body["payerFsp"] = json!(42);
        body["amount"] = json!("100");

        let err = reject(&headers(), &body);
        assert_eq!(err.violations()[0].path, "body.payerFsp");
        assert_eq!(err.violations()[0].code, ViolationCode::Type);
        assert_eq!(err.violations()[1].path, "body.amount");
    }

    #[test]
    fn test_non_object_body() {
        let err = reject(&headers(), &json!([1, 2, 3]));
        assert_eq!(err.first().unwrap().path, "body");
        assert_eq!(err.first().unwrap().code, ViolationCode::Type);

        let err = reject(&headers(), &Value::Null);
        assert_eq!(err.first().unwrap().code, ViolationCode::Required);
    }

    #[test]
    fn test_fsp_identifier_length() {
        let mut body = body();
        body["payeeFsp"] = json!("");
        let err = reject(&headers(), &body);
        assert_eq!(err.first().unwrap().path, "body.payeeFsp");

        let mut body = self::body();
        body["payeeFsp"] = json!("p".repeat(33));
        assert!(reject(&headers(), &body).mentions("body.payeeFsp"));
    }

    #[test]
    fn test_invalid_transfer_id() {
        let mut body = body();
        body["transferId"] = json!("12345");
        let err = reject(&headers(), &body);
        assert_eq!(err.first().unwrap().path, "body.transferId");
        assert_eq!(err.first().unwrap().code, ViolationCode::Format);
    }

    #[test]
    fn test_transfer_id_is_kept_as_submitted() {
        for submitted in [
            "B51EC534-EE48-4575-B6A9-EAD2955B8069",
            "{b51ec534-ee48-4575-b6a9-ead2955b8069}",
        ] {
            let mut body = body();
            body["transferId"] = json!(submitted);
            let command = SchemaValidator::new().validate(&headers(), &body).unwrap();
            assert_eq!(command.transfer_id, submitted);
        }
    }

    #[test]
    fn test_urn_transfer_id_is_rejected() {
        let mut body = body();
        body["transferId"] = json!(format!("urn:uuid:{}", TRANSFER_ID));
        let err = reject(&headers(), &body);
        assert_eq!(err.first().unwrap().path, "body.transferId");
        assert_eq!(err.first().unwrap().code, ViolationCode::Format);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let validator = SchemaValidator::new();
        let mut body = body();
        body["expiration"] = json!("tomorrow");

        let first = validator.validate(&headers(), &body);
        let second = validator.validate(&headers(), &body);
        assert_eq!(first, second);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn four_or_more_fraction_digits_never_pass(
                int in "[1-9][0-9]{0,10}",
                frac in "[0-9]{4,8}",
            ) {
                let mut body = body();
                body["amount"]["amount"] = json!(format!("{int}.{frac}"));
                let err = SchemaValidator::new().validate(&headers(), &body).unwrap_err();
                prop_assert!(err.mentions("body.amount.amount"));
            }

            #[test]
            fn validate_is_deterministic(payer in "\\PC{0,40}", amount in "\\PC{0,12}") {
                let validator = SchemaValidator::new();
                let mut body = body();
                body["payerFsp"] = json!(payer);
                body["amount"]["amount"] = json!(amount);
                prop_assert_eq!(
                    validator.validate(&headers(), &body),
                    validator.validate(&headers(), &body)
                );
            }
        }
    }
}
