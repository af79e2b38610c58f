//! Overpass QL builders. Pure string construction.
//!
//! Metadata (tags only) and geometry (full node lists) are fetched by
//! separate queries so the cheap lookup stays small until geometry is needed.

/// Escape a value for use inside a double-quoted Overpass QL string.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Admin-level-9 boundary relations inside the area named `city_name`, tags only.
pub fn city_area_query(city_name: &str) -> String {
    format!(
        r#"[out:json][timeout:120];
area["name"={name}]->.a;
(
  relation(area.a)["boundary"="administrative"]["admin_level"="9"];
);
out tags;"#,
        name = quote(city_name)
    )
}

/// The city relation itself, with full geometry. Fallback for cities
/// without sub-districts.
pub fn city_boundary_query(city_name: &str) -> String {
    let name = quote(city_name);
    format!(
        r#"[out:json][timeout:120];
(
  relation["place"="city"]["name"={name}];
  relation["boundary"="administrative"]["admin_level"="6"]["name"={name}];
);
out geom;"#,
        name = name
    )
}

/// Outer member ways of the given relations, with tags and node geometry.
pub fn districts_geometry_query(relation_ids: &[i64]) -> String {
    let ids = relation_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"[out:json][timeout:180];
relation(id:{ids})->.rels;
way(r.rels:"outer")->.outerWays;
.outerWays out tags geom;"#,
        ids = ids
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_area_query() {
        let q = city_area_query("Хабаровск");
        assert!(q.starts_with("[out:json][timeout:120];"));
        assert!(q.contains(r#"area["name"="Хабаровск"]->.a;"#));
        assert!(q.contains(r#"relation(area.a)["boundary"="administrative"]["admin_level"="9"];"#));
        assert!(q.ends_with("out tags;"));
    }

    #[test]
    fn test_city_boundary_query() {
        let q = city_boundary_query("Магадан");
        assert!(q.contains(r#"relation["place"="city"]["name"="Магадан"];"#));
        assert!(q.contains(
            r#"relation["boundary"="administrative"]["admin_level"="6"]["name"="Магадан"];"#
        ));
        assert!(q.ends_with("out geom;"));
    }

    #[test]
    fn test_districts_geometry_query() {
        let q = districts_geometry_query(&[101, 202, 303]);
        assert!(q.starts_with("[out:json][timeout:180];"));
        assert!(q.contains("relation(id:101,202,303)->.rels;"));
        assert!(q.contains(r#"way(r.rels:"outer")->.outerWays;"#));
        assert!(q.ends_with(".outerWays out tags geom;"));
    }

    #[test]
    fn test_name_is_escaped() {
        let q = city_area_query(r#"Evil"];out;"#);
        assert!(q.contains(r#"area["name"="Evil\"];out;"]->.a;"#));
    }
}
