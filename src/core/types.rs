use std::fmt;
use serde::{Serialize, Deserialize};
use serde_json::Value;

/// One row as delivered by the source-of-truth or read back from the mirror.
pub type SourceRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl ProductId {
    pub fn new(id: i64) -> Self {
        ProductId(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        ProductId(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const IN_STOCK_LABEL: &str = "Con Stock";
pub const OUT_OF_STOCK_LABEL: &str = "Sin Stock";

/// Stock state of a product. Unknown labels are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StockStatus {
    InStock,
    #[default]
    OutOfStock,
    Other(String),
}

impl StockStatus {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "con stock" | "in stock" => StockStatus::InStock,
            "sin stock" | "out of stock" => StockStatus::OutOfStock,
            _ => StockStatus::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StockStatus::InStock => IN_STOCK_LABEL,
            StockStatus::OutOfStock => OUT_OF_STOCK_LABEL,
            StockStatus::Other(label) => label,
        }
    }

    pub fn is_in_stock(&self) -> bool {
        matches!(self, StockStatus::InStock)
    }
}

impl From<String> for StockStatus {
    fn from(raw: String) -> Self {
        StockStatus::parse(&raw)
    }
}

impl From<StockStatus> for String {
    fn from(status: StockStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized row of the products table.
///
/// Serialized with the table's column names so the mirror file keeps the
/// layout the rest of the stack already reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductRecord {
    #[serde(rename = "id")]
    pub id: ProductId,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Modelo")]
    pub model: String,
    #[serde(rename = "Tamaño")]
    pub size: String,
    #[serde(rename = "Precio B")]
    pub price_b: f64,
    #[serde(rename = "Precio J")]
    pub price_j: f64,
    #[serde(rename = "Categoria")]
    pub category: String,
    #[serde(rename = "Sub Categoria")]
    pub subcategory: String,
    #[serde(rename = "Sub Categoria Nivel")]
    pub subcategory_rank: String,
    #[serde(rename = "Stock")]
    pub stock: StockStatus,
    #[serde(rename = "Descripcion")]
    pub description: String,
    #[serde(rename = "Al Por Mayor")]
    pub bulk_order: bool,
    #[serde(rename = "Cantidad")]
    pub quantity: i64,
    #[serde(rename = "Photo")]
    pub photo: String,
}

impl ProductRecord {
    pub fn new(id: i64, sku: &str, name: &str) -> Self {
        ProductRecord {
            id: ProductId(id),
            sku: sku.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Normalize a raw row. Never fails: missing or unreadable columns take
    /// empty/zero defaults.
    pub fn from_row(row: &SourceRow) -> Self {
        Self::from_row_counted(row).0
    }

    /// Like [`from_row`](Self::from_row), also returning how many expected
    /// columns had to be defaulted.
    pub fn from_row_counted(row: &SourceRow) -> (Self, usize) {
        let mut reader = RowReader { row, defaulted: 0 };

        let record = ProductRecord {
            id: ProductId(reader.integer("id")),
            sku: reader.text("SKU"),
            name: reader.text("Nombre"),
            model: reader.text("Modelo"),
            size: reader.text("Tamaño"),
            price_b: reader.float("Precio B"),
            price_j: reader.float("Precio J"),
            category: reader.text("Categoria"),
            subcategory: reader.text("Sub Categoria"),
            subcategory_rank: reader.text("Sub Categoria Nivel"),
            stock: StockStatus::parse(&reader.text("Stock")),
            description: reader.text("Descripcion"),
            bulk_order: reader.flag("Al Por Mayor"),
            quantity: reader.integer("Cantidad"),
            photo: reader.text("Photo"),
        };

        (record, reader.defaulted)
    }

    /// Back to the column layout used by the source and the mirror.
    pub fn to_row(&self) -> SourceRow {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => SourceRow::new(),
        }
    }
}

struct RowReader<'a> {
    row: &'a SourceRow,
    defaulted: usize,
}

impl<'a> RowReader<'a> {
    fn value(&mut self, column: &str) -> Option<&'a Value> {
        let value = self.row.get(column);
        if value.is_none() {
            self.defaulted += 1;
        }
        value
    }

    fn text(&mut self, column: &str) -> String {
        match self.value(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        }
    }

    fn float(&mut self, column: &str) -> f64 {
        let parsed = match self.value(column) {
            None | Some(Value::Null) => Some(0.0),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) if s.trim().is_empty() => Some(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match parsed {
            Some(v) if v.is_finite() => v,
            _ => {
                self.defaulted += 1;
                0.0
            }
        }
    }

    fn integer(&mut self, column: &str) -> i64 {
        let parsed = match self.value(column) {
            None | Some(Value::Null) => Some(0),
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) if s.trim().is_empty() => Some(0),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Some(_) => None,
        };
        parsed.unwrap_or_else(|| {
            self.defaulted += 1;
            0
        })
    }

    fn flag(&mut self, column: &str) -> bool {
        match self.value(column) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "true" | "si" | "sí" | "s" | "yes" | "y" | "x"
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> SourceRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn normalizes_strings_and_nulls() {
        let raw = row(json!({
            "id": 7,
            "SKU": "  B7 ",
            "Nombre": "Pilsen Callao 630ml ",
            "Modelo": null,
            "Tamaño": "630ml",
            "Precio B": "5.50",
            "Precio J": 5,
            "Categoria": "CERVEZA",
            "Sub Categoria": "Cervezas",
            "Sub Categoria Nivel": 2,
            "Stock": "Con Stock",
            "Descripcion": null,
            "Al Por Mayor": "Si",
            "Cantidad": "12",
            "Photo": ""
        }));

        let (record, defaulted) = ProductRecord::from_row_counted(&raw);
        assert_eq!(defaulted, 0);
        assert_eq!(record.id, ProductId(7));
        assert_eq!(record.sku, "B7");
        assert_eq!(record.name, "Pilsen Callao 630ml");
        assert_eq!(record.model, "");
        assert_eq!(record.price_b, 5.5);
        assert_eq!(record.price_j, 5.0);
        assert_eq!(record.subcategory_rank, "2");
        assert_eq!(record.stock, StockStatus::InStock);
        assert!(record.bulk_order);
        assert_eq!(record.quantity, 12);
    }

    #[test]
    fn malformed_rows_take_defaults_instead_of_failing() {
        let raw = row(json!({ "id": "abc", "SKU": "X1", "Precio B": "cheap" }));
        let (record, defaulted) = ProductRecord::from_row_counted(&raw);

        assert_eq!(record.id, ProductId(0));
        assert_eq!(record.sku, "X1");
        assert_eq!(record.price_b, 0.0);
        assert_eq!(record.name, "");
        assert!(defaulted >= 2);
    }

    #[test]
    fn stock_labels_parse_case_insensitively() {
        assert_eq!(StockStatus::parse("con stock"), StockStatus::InStock);
        assert_eq!(StockStatus::parse(" Out of Stock "), StockStatus::OutOfStock);
        assert_eq!(StockStatus::parse("Pedido"), StockStatus::Other("Pedido".into()));
        assert_eq!(StockStatus::InStock.as_str(), "Con Stock");
    }

    #[test]
    fn to_row_uses_column_names() {
        let mut record = ProductRecord::new(3, "S3", "Ron Cartavio");
        record.stock = StockStatus::InStock;
        let back = ProductRecord::from_row(&record.to_row());

        assert_eq!(back, record);
        assert!(record.to_row().contains_key("Sub Categoria"));
    }
}
