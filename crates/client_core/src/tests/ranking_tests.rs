use super::*;

fn labels(ranked: &[Prediction]) -> Vec<&str> {
    ranked.iter().map(|p| p.label.as_str()).collect()
}

#[test]
fn sorts_descending_by_probability() {
    let ranked = rank(
        [("Kawung", 0.1), ("Parang", 0.6), ("Truntum", 0.3)],
        None,
    );
    assert_eq!(labels(&ranked), ["Parang", "Truntum", "Kawung"]);
}

#[test]
fn ties_keep_input_order() {
    let ranked = rank(
        [("Nitik", 0.2), ("Ceplok", 0.4), ("Tambal", 0.2), ("Lereng", 0.2)],
        None,
    );
    assert_eq!(labels(&ranked), ["Ceplok", "Nitik", "Tambal", "Lereng"]);
}

#[test]
fn moves_designated_primary_to_front() {
    let ranked = rank([("Kawung", 0.5), ("Parang", 0.5)], Some("Parang"));
    assert_eq!(labels(&ranked), ["Parang", "Kawung"]);
}

#[test]
fn unknown_primary_leaves_order_untouched() {
    let ranked = rank([("Kawung", 0.3), ("Parang", 0.7)], Some("Sekar Jagad"));
    assert_eq!(labels(&ranked), ["Parang", "Kawung"]);
}

#[test]
fn duplicate_labels_keep_highest_entry() {
    let ranked = rank(
        [("Parang", 0.2), ("Kawung", 0.3), ("Parang", 0.5)],
        Some("Parang"),
    );
    assert_eq!(labels(&ranked), ["Parang", "Kawung"]);
    assert_eq!(ranked[0].probability, 0.5);
}

#[test]
fn truncates_to_five_entries() {
    let entries = [
        ("a", 0.05),
        ("b", 0.3),
        ("c", 0.1),
        ("d", 0.2),
        ("e", 0.15),
        ("f", 0.12),
        ("g", 0.08),
    ];
    let ranked = rank(entries, None);
    assert_eq!(ranked.len(), MAX_RANKED_PREDICTIONS);
    assert_eq!(labels(&ranked), ["b", "d", "e", "f", "c"]);
}

#[test]
fn output_is_sorted_unique_and_bounded_for_many_inputs() {
    let catalog = ["Parang", "Kawung", "Truntum", "Nitik", "Ceplok", "Lereng", "Tambal"];
    for seed in 0..64u32 {
        let entries: Vec<(&str, f64)> = catalog
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let raw = (seed.wrapping_mul(31).wrapping_add(i as u32 * 17) % 97) as f64;
                (*label, raw / 100.0)
            })
            .collect();
        let ranked = rank(entries.iter().copied(), None);

        assert!(ranked.len() <= MAX_RANKED_PREDICTIONS);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].probability >= pair[1].probability));
        let unique: HashSet<_> = ranked.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(unique.len(), ranked.len());

        let max = entries.iter().map(|(_, p)| *p).fold(f64::MIN, f64::max);
        assert_eq!(ranked[0].probability, max);
    }
}

#[test]
fn empty_input_yields_empty_ranking() {
    assert!(rank(std::iter::empty(), None).is_empty());
}
