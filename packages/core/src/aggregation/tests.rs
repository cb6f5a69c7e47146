//! Tests for the live-score and market merges, including property-based
//! checks of the confidence and ordering invariants.

#[cfg(test)]
mod tests {
    use crate::aggregation::{
        aggregator::{merge_live_scores, merge_markets},
        types::*,
    };
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T19:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn score(provider: &str, home: &str, away: &str, hs: u32, as_: u32, secs: i64) -> LiveScore {
        LiveScore {
            provider_id: provider.to_string(),
            match_id: format!("{provider}-match"),
            sport: "soccer".to_string(),
            league: Some("epl".to_string()),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: as_,
            period: Some("2H".to_string()),
            status: MatchStatus::Live,
            timestamp: base_time() + Duration::seconds(secs),
        }
    }

    fn quote(provider: &str, selection: &str, odds: f64) -> MarketOdds {
        MarketOdds {
            provider_id: provider.to_string(),
            id: format!("{provider}-{selection}"),
            event_id: "evt-1".to_string(),
            market_type: "moneyline".to_string(),
            selection: selection.to_string(),
            odds,
            timestamp: base_time(),
        }
    }

    // =========================================================================
    // Live scores
    // =========================================================================

    #[test]
    fn single_source_has_full_confidence() {
        let merged = merge_live_scores(&[score("espn", "Arsenal", "Chelsea", 1, 0, 0)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 1.0);
        assert_eq!(merged[0].sources, vec!["espn".to_string()]);
    }

    #[test]
    fn agreeing_sources_raise_confidence() {
        let merged = merge_live_scores(&[
            score("espn", "Arsenal", "Chelsea", 2, 1, 0),
            score("opta", "arsenal", "CHELSEA!", 2, 1, 5),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sources.len(), 2);
        assert!(merged[0].confidence >= 0.65);
    }

    #[test]
    fn disagreeing_sources_lower_confidence() {
        let merged = merge_live_scores(&[
            score("espn", "Arsenal", "Chelsea", 2, 1, 0),
            score("opta", "Arsenal", "Chelsea", 3, 1, 5),
        ]);

        assert!((merged[0].confidence - 0.8).abs() < 1e-9);
        assert!(merged[0].confidence < 1.0);
    }

    #[test]
    fn newer_reading_wins_regardless_of_order() {
        let merged = merge_live_scores(&[
            score("espn", "Arsenal", "Chelsea", 2, 1, 30),
            score("opta", "Arsenal", "Chelsea", 1, 1, 10),
        ]);

        assert_eq!((merged[0].home_score, merged[0].away_score), (2, 1));
        assert_eq!(merged[0].timestamp, base_time() + Duration::seconds(30));
    }

    #[test]
    fn equal_timestamp_does_not_overwrite() {
        let merged = merge_live_scores(&[
            score("espn", "Arsenal", "Chelsea", 2, 1, 10),
            score("opta", "Arsenal", "Chelsea", 3, 1, 10),
        ]);

        assert_eq!(merged[0].home_score, 2);
    }

    #[test]
    fn newer_reading_overwrites_period_and_status() {
        let mut late = score("opta", "Arsenal", "Chelsea", 3, 1, 60);
        late.status = MatchStatus::Finished;
        late.period = Some("FT".to_string());

        let merged = merge_live_scores(&[score("espn", "Arsenal", "Chelsea", 2, 1, 0), late]);

        assert_eq!(merged[0].status, MatchStatus::Finished);
        assert_eq!(merged[0].period.as_deref(), Some("FT"));
        assert_eq!(merged[0].match_id, "espn-match");
    }

    #[test]
    fn different_sports_never_merge() {
        let mut nba = score("espn", "Arsenal", "Chelsea", 1, 0, 0);
        nba.sport = "basketball".to_string();

        let merged = merge_live_scores(&[score("espn", "Arsenal", "Chelsea", 1, 0, 0), nba]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn output_follows_first_appearance() {
        let merged = merge_live_scores(&[
            score("a", "Zeta", "Yotta", 0, 0, 0),
            score("a", "Alpha", "Beta", 0, 0, 0),
            score("b", "Zeta", "Yotta", 0, 0, 0),
        ]);

        assert_eq!(merged[0].home_team, "Zeta");
        assert_eq!(merged[1].home_team, "Alpha");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(merge_live_scores(&[]).is_empty());
        assert!(merge_markets(&[]).is_empty());
    }

    // =========================================================================
    // Markets
    // =========================================================================

    #[test]
    fn single_quote_seeds_aggregate() {
        let merged = merge_markets(&[quote("pinnacle", "home", 2.2)]);

        assert_eq!(merged[0].confidence, 1.0);
        assert_eq!(merged[0].best_odds, 2.2);
        assert_eq!(merged[0].average_odds, 2.2);
        assert_eq!(merged[0].sources, vec!["pinnacle".to_string()]);
    }

    #[test]
    fn close_odds_keep_high_confidence() {
        let merged = merge_markets(&[quote("a", "home", 2.50), quote("b", "home", 2.52)]);
        assert!(merged[0].confidence >= 0.8 - 1e-9);
    }

    #[test]
    fn divergent_odds_drop_confidence() {
        let merged = merge_markets(&[quote("a", "home", 2.50), quote("b", "home", 3.00)]);
        assert!(merged[0].confidence <= 0.4);
    }

    #[test]
    fn best_odds_promoted_to_primary() {
        let merged = merge_markets(&[
            quote("a", "home", 2.1),
            quote("b", "home", 2.5),
            quote("c", "home", 2.3),
        ]);

        let market = &merged[0];
        assert_eq!(market.best_odds, 2.5);
        assert_eq!(market.odds, 2.5);
        assert_eq!(market.provider_id, "b");
        assert_eq!(market.market_id, "b-home");
        assert!((market.average_odds - (2.1 + 2.5 + 2.3) / 3.0).abs() < 1e-9);
        assert_eq!(market.sources, vec!["a", "b", "c"]);
    }

    #[test]
    fn quotes_retain_actual_history() {
        let merged = merge_markets(&[
            quote("a", "home", 1.8),
            quote("b", "home", 2.6),
            quote("c", "home", 1.9),
        ]);

        let odds: Vec<f64> = merged[0].quotes.iter().map(|q| q.odds).collect();
        assert_eq!(odds, vec![1.8, 2.6, 1.9]);
    }

    #[test]
    fn selections_are_separate_markets() {
        let merged = merge_markets(&[
            quote("a", "home", 2.0),
            quote("a", "away", 3.4),
            quote("b", "home", 2.05),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].selection, "home");
        assert_eq!(merged[0].sources.len(), 2);
        assert_eq!(merged[1].sources.len(), 1);
    }

    // =========================================================================
    // PROPERTY TESTS
    // =========================================================================

    fn odds_strategy() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(1.01f64..50.0f64, 1..12)
    }

    fn scores_strategy() -> impl Strategy<Value = Vec<(u32, u32, i64)>> {
        prop::collection::vec((0u32..6, 0u32..6, 0i64..600), 1..12)
    }

    proptest! {
        #[test]
        fn prop_market_confidence_in_unit_range(odds in odds_strategy()) {
            let readings: Vec<MarketOdds> = odds
                .iter()
                .enumerate()
                .map(|(i, o)| quote(&format!("p{i}"), "home", *o))
                .collect();

            let merged = merge_markets(&readings);
            prop_assert_eq!(merged.len(), 1);
            prop_assert!((0.0..=1.0).contains(&merged[0].confidence));
        }

        #[test]
        fn prop_best_and_average_match_quotes(odds in odds_strategy()) {
            let readings: Vec<MarketOdds> = odds
                .iter()
                .enumerate()
                .map(|(i, o)| quote(&format!("p{i}"), "home", *o))
                .collect();

            let market = &merge_markets(&readings)[0];
            let max = odds.iter().cloned().fold(f64::MIN, f64::max);
            let mean = odds.iter().sum::<f64>() / odds.len() as f64;

            prop_assert_eq!(market.best_odds, max);
            prop_assert_eq!(market.odds, max);
            prop_assert!((market.average_odds - mean).abs() < 1e-9);
        }

        #[test]
        fn prop_score_sources_keep_input_order(entries in scores_strategy()) {
            let readings: Vec<LiveScore> = entries
                .iter()
                .enumerate()
                .map(|(i, (h, a, t))| score(&format!("p{i}"), "Home FC", "Away FC", *h, *a, *t))
                .collect();

            let merged = merge_live_scores(&readings);
            let expected: Vec<String> = (0..entries.len()).map(|i| format!("p{i}")).collect();

            prop_assert_eq!(merged.len(), 1);
            prop_assert_eq!(&merged[0].sources, &expected);
            prop_assert!((0.0..=1.0).contains(&merged[0].confidence));
        }

        #[test]
        fn prop_score_takes_latest_timestamp(entries in scores_strategy()) {
            let readings: Vec<LiveScore> = entries
                .iter()
                .enumerate()
                .map(|(i, (h, a, t))| score(&format!("p{i}"), "Home FC", "Away FC", *h, *a, *t))
                .collect();

            let merged = merge_live_scores(&readings);
            let latest = readings.iter().map(|r| r.timestamp).max().unwrap();
            prop_assert_eq!(merged[0].timestamp, latest);
        }
    }
}
