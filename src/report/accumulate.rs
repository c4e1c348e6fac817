//! Running aggregates fed one scanned row at a time.

use indexmap::IndexMap;

use super::SaleFacts;

/// Total sales amount of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTotal {
    pub region: String,
    pub total: f64,
}

/// Units sold of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuantity {
    pub product: String,
    pub quantity: i64,
}

/// Mean sales amount of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAverage {
    pub category: String,
    pub average: f64,
    pub rows: usize,
}

/// Sum of `quantity * unit_price` per country.
#[derive(Debug, Default)]
pub struct RegionTotals {
    totals: IndexMap<String, f64>,
}

impl RegionTotals {
    pub fn add(&mut self, facts: &SaleFacts) {
        *self.totals.entry(facts.country.clone()).or_insert(0.0) += facts.amount();
    }

    /// Totals, largest first. Equal totals keep the order regions were first seen.
    pub fn finish(self) -> Vec<RegionTotal> {
        let mut totals: Vec<_> = self
            .totals
            .into_iter()
            .map(|(region, total)| RegionTotal { region, total })
            .collect();
        totals.sort_by(|a, b| b.total.total_cmp(&a.total));
        totals
    }
}

/// Sum of quantity per product description.
#[derive(Debug, Default)]
pub struct TopProducts {
    quantities: IndexMap<String, i64>,
}

impl TopProducts {
    pub fn add(&mut self, facts: &SaleFacts) {
        let quantity = self.quantities.entry(facts.description.clone()).or_insert(0);
        *quantity = quantity.saturating_add(facts.quantity);
    }

    /// The `n` best sellers, largest first. Ties keep first-seen order.
    pub fn finish(self, n: usize) -> Vec<ProductQuantity> {
        let mut products: Vec<_> = self
            .quantities
            .into_iter()
            .map(|(product, quantity)| ProductQuantity { product, quantity })
            .collect();
        products.sort_by(|a, b| b.quantity.cmp(&a.quantity));
        products.truncate(n);
        products
    }
}

/// Sum of sales amount and row count per category.
#[derive(Debug, Default)]
pub struct CategoryAverages {
    sums: IndexMap<String, (f64, usize)>,
}

impl CategoryAverages {
    pub fn add(&mut self, facts: &SaleFacts) {
        let (sum, rows) = self.sums.entry(facts.category.clone()).or_insert((0.0, 0));
        *sum += facts.amount();
        *rows += 1;
    }

    /// Averages ordered by category name.
    pub fn finish(self) -> Vec<CategoryAverage> {
        let mut averages: Vec<_> = self
            .sums
            .into_iter()
            .map(|(category, (sum, rows))| CategoryAverage {
                category,
                average: sum / rows as f64,
                rows,
            })
            .collect();
        averages.sort_by(|a, b| a.category.cmp(&b.category));
        averages
    }
}
