//! Parser for plain-text order files.
//!
//! ```text
//! # comment
//! Max,Mustermann,42
//! 2*1.5;1*2.5   # trailing comment
//! ```
//!
//! The first comma-separated line names the customer; every line holding
//! `qty*length` items separated by `;` adds demand.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::types::{Customer, Length, Order};

const MIN_CUSTOMER_FIELDS: usize = 2;
const MAX_CUSTOMER_FIELDS: usize = 7;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("input data is empty!")]
    Empty,

    #[error("no order items found")]
    NoItems,

    #[error("line {line}: malformed item '{item}', expected qty*length")]
    MalformedItem { line: usize, item: String },

    #[error("line {line}: quantity must be greater than 0 in '{item}'")]
    ZeroQuantity { line: usize, item: String },

    #[error("line {line}: total quantity in '{item}' exceeds {max}", max = u32::MAX)]
    QuantityOutOfRange { line: usize, item: String },

    #[error("line {line}: length must be greater than 0 in '{item}'")]
    NonPositiveLength { line: usize, item: String },

    #[error("line {line}: customer id '{id}' is out of range")]
    CustomerIdOutOfRange { line: usize, id: String },
}

pub fn parse_order(input: &str) -> Result<Order, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut customer: Option<Customer> = None;
    let mut items: Vec<(usize, &str, Length, u32)> = Vec::new();

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || (trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"'))
        {
            continue;
        }
        let line = match trimmed.find('#') {
            Some(pos) => trimmed[..pos].trim(),
            None => trimmed,
        };

        let has_items = line.contains(';') || line.contains('*');
        if customer.is_none() && line.contains(',') && !has_items {
            customer = parse_customer(line, line_no)?;
        } else if has_items {
            for (item, length, quantity) in parse_items(line, line_no)? {
                items.push((line_no, item, length, quantity));
            }
        } else {
            tracing::debug!(line = line_no, "ignoring unrecognized line");
        }
    }

    if items.is_empty() {
        return Err(ParseError::NoItems);
    }
    let mut order = Order::new(customer.unwrap_or_default());
    for (line, item, length, quantity) in items {
        order
            .try_add_item(length, quantity)
            .map_err(|_| ParseError::QuantityOutOfRange {
                line,
                item: item.to_string(),
            })?;
    }
    Ok(order)
}

/// `None` when the line does not look like a customer record.
fn parse_customer(line: &str, line_no: usize) -> Result<Option<Customer>, ParseError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if !(MIN_CUSTOMER_FIELDS..=MAX_CUSTOMER_FIELDS).contains(&fields.len()) {
        return Ok(None);
    }
    let (last, names) = match fields.split_last() {
        Some(split) => split,
        None => return Ok(None),
    };
    if !names.iter().all(|f| is_alphabetic(f)) {
        return Ok(None);
    }

    if is_integer(last) {
        let id = last.parse::<u32>().map_err(|_| ParseError::CustomerIdOutOfRange {
            line: line_no,
            id: last.to_string(),
        })?;
        Ok(Some(Customer::new(id, names.join(" "))))
    } else if is_alphabetic(last) {
        let name = fields.join(" ");
        Ok(Some(Customer::new(customer_id_from_name(&name), name)))
    } else {
        Ok(None)
    }
}

fn parse_items(line: &str, line_no: usize) -> Result<Vec<(&str, Length, u32)>, ParseError> {
    line.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_item(item, line_no).map(|(length, qty)| (item, length, qty)))
        .collect()
}

fn parse_item(item: &str, line_no: usize) -> Result<(Length, u32), ParseError> {
    let malformed = || ParseError::MalformedItem {
        line: line_no,
        item: item.to_string(),
    };
    let (qty, length) = item.split_once('*').ok_or_else(malformed)?;
    let (qty, length) = (qty.trim(), length.trim());
    if !is_integer(qty) || !is_decimal(length) {
        return Err(malformed());
    }

    let quantity = qty.parse::<u32>().map_err(|_| malformed())?;
    if quantity == 0 {
        return Err(ParseError::ZeroQuantity {
            line: line_no,
            item: item.to_string(),
        });
    }
    let value = length.parse::<f64>().map_err(|_| malformed())?;
    let length = Length::try_new(value).map_err(|_| ParseError::NonPositiveLength {
        line: line_no,
        item: item.to_string(),
    })?;
    Ok((length, quantity))
}

/// Stable, non-negative id for customers given only by name.
fn customer_id_from_name(name: &str) -> u32 {
    let mut hasher = FxHasher::default();
    name.trim().to_lowercase().hash(&mut hasher);
    (hasher.finish() & 0x7fff_ffff) as u32
}

fn is_alphabetic(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_decimal(s: &str) -> bool {
    match s.split_once('.') {
        Some((whole, frac)) => is_integer(whole) && is_integer(frac),
        None => is_integer(s),
    }
}
