use roxmltree::{Document, Node};

use crate::error::Error;
use crate::models::{ElectricityPoint, Interval, Rates};

/// Parse the consumption endpoint's XML payload into the usage points and
/// the billing-period rates.
///
/// Only points with `quality="ACTUAL"` are retained, in document order.
/// ESTIMATED points exist but are not considered reliable. Attribute values
/// are carried exactly as provided; numeric coercion is a caller concern.
pub fn parse_consumption_xml(raw: &str) -> Result<(Vec<ElectricityPoint>, Rates), Error> {
    let document = Document::parse(raw)?;
    let root = document.root_element();

    let series = root
        .descendants()
        .find(|node| node.has_tag_name("Series"))
        .ok_or(Error::InvalidData("Series"))?;

    let mut electricity = Vec::new();
    for point in series.children().filter(|node| node.has_tag_name("Point")) {
        if point.attribute("quality") != Some("ACTUAL") {
            continue;
        }

        electricity.push(ElectricityPoint {
            point_type: attr(&point, "type"),
            quality: attr(&point, "quality"),
            consumption: attr(&point, "value"),
            cost: attr(&point, "cost"),
            interval: Interval {
                start: attr(&point, "dateTime"),
                end: attr(&point, "endTime"),
            },
        });
    }

    let rates = root
        .descendants()
        .find(|node| node.has_tag_name("Rates"))
        .ok_or(Error::InvalidData("Rates"))?;

    let rates = Rates {
        days_since_billing: attr(&rates, "daysSince"),
        consumption_to_date: attr(&rates, "cons2date"),
        cost_to_date: attr(&rates, "cost2date"),
        estimated_consumption: attr(&rates, "estCons"),
        estimated_cost: attr(&rates, "estCost"),
    };

    Ok((electricity, rates))
}

fn attr(node: &Node, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}
