use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pattern::{Pattern, round5, sum_piece_counts};

/// A strictly positive pipe length, used both for stock pipes and for
/// demanded pieces.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Length(f64);

impl Length {
    /// Panics if `value` is not a finite number greater than zero.
    pub fn new(value: f64) -> Self {
        assert!(
            value.is_finite() && value > 0.0,
            "length must be greater than 0, got {value}"
        );
        Self(value)
    }

    pub fn try_new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(Error::InvalidLength(value))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Length {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::try_new(value)
    }
}

impl From<Length> for f64 {
    fn from(length: Length) -> f64 {
        length.0
    }
}

impl std::fmt::Display for Length {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u32,
    pub name: String,
}

impl Customer {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Customer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Customer [id={}, name={}]", self.id, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandItem {
    pub length: Length,
    pub quantity: u32,
}

/// A customer's demand: unique lengths, each with an accumulated quantity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Order {
    customer: Customer,
    items: Vec<DemandItem>,
}

impl Order {
    pub fn new(customer: Customer) -> Self {
        Self {
            customer,
            items: Vec::new(),
        }
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn items(&self) -> &[DemandItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds `quantity` pieces of `length`, merging with an existing item of
    /// exactly the same length.
    ///
    /// Panics if `quantity` is zero or the merged quantity overflows.
    pub fn add_item(&mut self, length: Length, quantity: u32) {
        if let Err(e) = self.try_add_item(length, quantity) {
            panic!("{e}");
        }
    }

    pub fn try_add_item(&mut self, length: Length, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(Error::ZeroQuantity(length));
        }
        match self.items.iter_mut().find(|item| item.length == length) {
            Some(item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(Error::QuantityOverflow(length))?;
            }
            None => self.items.push(DemandItem { length, quantity }),
        }
        Ok(())
    }

    /// One entry per demanded piece, longest first. The solver relies on
    /// this ordering for both its exploration order and its pruning.
    pub fn expand_to_pieces(&self) -> Vec<Length> {
        let mut pieces: Vec<Length> = self
            .items
            .iter()
            .flat_map(|item| std::iter::repeat_n(item.length, item.quantity as usize))
            .collect();
        pieces.sort_by(|a, b| b.0.total_cmp(&a.0));
        pieces
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.customer == other.customer && self.expand_to_pieces() == other.expand_to_pieces()
    }
}

/// The fixed set of stock lengths available to cut from.
///
/// Lengths are deduplicated and kept longest first; the solver opens new
/// patterns in this order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    lengths: Vec<Length>,
}

impl Catalog {
    /// Panics if `lengths` is empty.
    pub fn new(lengths: impl IntoIterator<Item = Length>) -> Self {
        match Self::try_new(lengths) {
            Ok(catalog) => catalog,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_new(lengths: impl IntoIterator<Item = Length>) -> Result<Self> {
        let mut lengths: Vec<Length> = lengths.into_iter().collect();
        if lengths.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        lengths.sort_by(|a, b| b.0.total_cmp(&a.0));
        lengths.dedup();
        Ok(Self { lengths })
    }

    pub fn stock_lengths(&self) -> &[Length] {
        &self.lengths
    }

    pub fn longest(&self) -> Length {
        self.lengths[0]
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new([2.0, 3.0, 4.0, 5.0].map(Length::new))
    }
}

impl FromStr for Catalog {
    type Err = Error;

    /// Parses a comma-separated list such as `2,3,4.5`.
    fn from_str(s: &str) -> Result<Self> {
        let lengths = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let value = part
                    .parse::<f64>()
                    .map_err(|_| Error::InvalidNumber(part.to_string()))?;
                Length::try_new(value)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::try_new(lengths)
    }
}

/// The chosen cutting plan for an order.
///
/// Patterns are kept in presentation order: least offcut first, then longer
/// stock, then more cuts.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    order: Order,
    patterns: Vec<Pattern>,
}

impl Solution {
    pub fn new(order: Order, mut patterns: Vec<Pattern>) -> Self {
        for pattern in &mut patterns {
            pattern.sort_pieces();
        }
        patterns.sort_by(|a, b| {
            a.offcut()
                .total_cmp(&b.offcut())
                .then_with(|| b.stock().get().total_cmp(&a.stock().get()))
                .then_with(|| b.piece_count().cmp(&a.piece_count()))
        });
        Self { order, patterns }
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn total_offcut(&self) -> f64 {
        round5(self.patterns.iter().map(Pattern::offcut).sum())
    }

    pub fn total_pieces(&self) -> usize {
        sum_piece_counts(&self.patterns)
    }
}
