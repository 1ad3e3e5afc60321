use std::collections::HashMap;

use whotslot_core::{
    spin, spin_with_seeds, Amount, CoreError, EntropySource, PanelCount, Paytable, ProvablyFairRng,
    SpinOutcome, WinTier, CATALOG,
};

fn evaluate(bet: u64, cards: &[&str]) -> (WinTier, Amount) {
    let outcome = SpinOutcome::parse(cards).unwrap();
    Paytable::standard()
        .evaluate(outcome.symbols(), Amount::new(bet), Amount::new(5_000_000))
        .unwrap()
}

#[test]
fn rng_repeatable() {
    let a = spin_with_seeds("s", "c", 42, PanelCount::Four).unwrap();
    let b = spin_with_seeds("s", "c", 42, PanelCount::Four).unwrap();
    assert_eq!(a, b);
}

#[test]
fn ultimate_example() {
    let (tier, payout) = evaluate(100, &["whot_20.png"; 4]);
    assert_eq!(tier, WinTier::Ultimate);
    assert_eq!(payout, Amount::new(100_000));
}

#[test]
fn bonus_shape_example() {
    let (tier, payout) = evaluate(
        50,
        &["circle_3.png", "circle_7.png", "circle_3.png", "square_3.png"],
    );
    assert_eq!(tier, WinTier::BonusShape);
    assert_eq!(payout, Amount::new(500));
}

#[test]
fn no_match_example() {
    let (tier, payout) = evaluate(
        10,
        &["circle_1.png", "triangle_2.png", "star_4.png", "square_5.png"],
    );
    assert_eq!(tier, WinTier::None);
    assert_eq!(payout, Amount::ZERO);
}

#[test]
fn ultimate_outranks_same_rank_and_shape() {
    for n in [3usize, 4] {
        let cards = vec!["whot_20.png"; n];
        assert_eq!(evaluate(1, &cards).0, WinTier::Ultimate);
    }
}

#[test]
fn bounty_in_any_order() {
    let set = ["circle_1.png", "circle_4.png", "cross_5.png", "cross_13.png"];
    let orders = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];
    for order in orders {
        let cards: Vec<&str> = order.iter().map(|&i| set[i]).collect();
        let (tier, payout) = evaluate(10, &cards);
        assert_eq!(tier, WinTier::Bounty);
        assert_eq!(payout, Amount::new(5_000_000));
    }
}

#[test]
fn three_of_four_rank_is_bonus_shape_for_every_rank_group() {
    let pt = Paytable::standard();
    let mut by_rank: HashMap<u8, Vec<_>> = HashMap::new();
    for s in CATALOG {
        by_rank.entry(s.rank()).or_default().push(s);
    }
    for (rank, group) in by_rank.iter().filter(|(_, g)| g.len() >= 3) {
        let odd = CATALOG
            .iter()
            .copied()
            .find(|s| s.rank() != *rank && s.shape() != group[0].shape())
            .unwrap();
        let symbols = vec![group[0], group[1], group[2], odd];
        let tier = pt.classify(&symbols).unwrap();
        assert_eq!(tier, WinTier::BonusShape, "rank {rank}");
    }
}

struct Unavailable;

impl EntropySource for Unavailable {
    fn next_word(&mut self) -> Result<u32, CoreError> {
        Err(CoreError::RandomSourceUnavailable("remote randomiser down".into()))
    }
}

#[test]
fn unavailable_source_aborts_spin() {
    let err = spin(PanelCount::Three, &mut Unavailable).unwrap_err();
    assert!(matches!(err, CoreError::RandomSourceUnavailable(_)));
}

#[test]
fn panel_distribution_smoke() {
    let mut counts = vec![0u32; CATALOG.len()];
    for n in 0..5_000u64 {
        let rng = ProvablyFairRng::new("server", "client", n);
        let out = spin(PanelCount::Four, &mut rng.stream()).unwrap();
        for s in out.symbols() {
            counts[s.to_index()] += 1;
        }
    }
    // 20_000 draws over 50 cards: 400 expected per card
    assert!(counts.iter().all(|&c| c > 250 && c < 550), "{counts:?}");
}

#[test]
fn rtp_simulation_smoke() {
    let pt = Paytable::standard();
    let mut total_bet = 0u64;
    let mut total_payout = 0u64;
    for n in 0..2_000u64 {
        let out = spin_with_seeds("server", "client", n, PanelCount::Four).unwrap();
        let (_, payout) = pt
            .evaluate(out.symbols(), Amount::new(100), Amount::new(5_000_000))
            .unwrap();
        total_bet += 100;
        total_payout += payout.get();
    }
    // very loose bounds: bonus tiers alone return a few percent
    assert!(total_payout < total_bet * 100);
}
