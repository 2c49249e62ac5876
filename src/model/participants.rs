//! Participant syntax used when recording or editing a match.
//!
//! ```text
//! participants := group ( ","? group )* score_clause?
//! group        := "[" name ( "," name )* "]" | name
//! score_clause := "score:" int ( "," int )*
//! ```
//!
//! Groups are listed in finishing order unless a score is given for every
//! group, in which case the scores decide the places (higher is better,
//! equal scores tie). `Alice, Bob` is a 1v1 won by Alice,
//! `[Alice, Bob], [Carol, Dan] score:3,3` is a drawn 2v2.

use crate::model::{
    constants::FIRST_PLACE,
    error::{LeagueError, LeagueResult},
    state::LeagueState,
    structures::league_match::NewEntry
};

const SCORE_PREFIX: &str = "score:";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Name(String)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParticipants {
    pub groups: Vec<Vec<String>>,
    pub scores: Option<Vec<i64>>
}

impl ParsedParticipants {
    /// Places for each group: derived from scores when present, otherwise
    /// from listing order.
    pub fn places(&self) -> Vec<u32> {
        match &self.scores {
            Some(scores) => places_from_scores(scores),
            None => (FIRST_PLACE..).take(self.groups.len()).collect()
        }
    }
}

pub fn parse(input: &str) -> LeagueResult<ParsedParticipants> {
    let (participants, score_clause) = split_score_clause(input);

    let tokens = tokenize(participants);
    let groups = parse_groups(&tokens)?;
    let scores = score_clause.map(parse_scores).transpose()?;

    if let Some(scores) = &scores {
        if scores.len() != groups.len() {
            return Err(LeagueError::validation(format!(
                "Got {} scores for {} participants",
                scores.len(),
                groups.len()
            )));
        }
    }

    Ok(ParsedParticipants { groups, scores })
}

/// Parses the input and resolves every name to a player id.
pub fn resolve(input: &str, state: &LeagueState) -> LeagueResult<Vec<NewEntry>> {
    let parsed = parse(input)?;
    let places = parsed.places();

    parsed
        .groups
        .iter()
        .zip(parsed.scores.clone().map_or_else(|| vec![None; places.len()], |s| s.into_iter().map(Some).collect()))
        .zip(places)
        .map(|((names, score), place)| {
            let players = names
                .iter()
                .map(|name| {
                    state
                        .find_player(name)
                        .map(|p| p.id)
                        .ok_or_else(|| LeagueError::validation(format!("Player '{}' does not exist.", name)))
                })
                .collect::<LeagueResult<Vec<_>>>()?;

            Ok(NewEntry { players, place, score })
        })
        .collect()
}

/// Competition ranking: each group's place is one more than the number of
/// groups that scored strictly higher.
pub fn places_from_scores(scores: &[i64]) -> Vec<u32> {
    scores
        .iter()
        .map(|score| FIRST_PLACE + scores.iter().filter(|other| *other > score).count() as u32)
        .collect()
}

fn split_score_clause(input: &str) -> (&str, Option<&str>) {
    let at_boundary = |idx: usize| {
        input[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || c == ']' || c == ',')
    };

    match input.match_indices(SCORE_PREFIX).map(|(idx, _)| idx).find(|idx| at_boundary(*idx)) {
        Some(idx) => (&input[..idx], Some(&input[idx + SCORE_PREFIX.len()..])),
        None => (input, None)
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut name = String::new();

    let flush = |name: &mut String, tokens: &mut Vec<Token>| {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            tokens.push(Token::Name(trimmed.to_string()));
        }
        name.clear();
    };

    for c in input.chars() {
        match c {
            '[' => {
                flush(&mut name, &mut tokens);
                tokens.push(Token::Open);
            }
            ']' => {
                flush(&mut name, &mut tokens);
                tokens.push(Token::Close);
            }
            ',' => {
                flush(&mut name, &mut tokens);
                tokens.push(Token::Comma);
            }
            _ => name.push(c)
        }
    }
    flush(&mut name, &mut tokens);

    tokens
}

fn parse_groups(tokens: &[Token]) -> LeagueResult<Vec<Vec<String>>> {
    let mut groups = Vec::new();
    let mut iter = tokens.iter().peekable();
    // Set right after a separating comma, when another group must follow
    let mut pending_separator = false;

    while let Some(token) = iter.next() {
        match token {
            Token::Name(name) => {
                groups.push(vec![name.clone()]);
                pending_separator = false;
            }
            Token::Open => {
                let mut members = Vec::new();
                loop {
                    match iter.next() {
                        Some(Token::Name(name)) => members.push(name.clone()),
                        Some(Token::Comma) if !members.is_empty() => {
                            if !matches!(iter.peek(), Some(Token::Name(_))) {
                                return Err(LeagueError::validation("Expected a player name after ',' in team"));
                            }
                        }
                        Some(Token::Close) if !members.is_empty() => break,
                        Some(Token::Close) => return Err(LeagueError::validation("Empty team '[]'")),
                        Some(Token::Open) => return Err(LeagueError::validation("Teams cannot be nested")),
                        Some(Token::Comma) => return Err(LeagueError::validation("Expected a player name after '['")),
                        None => return Err(LeagueError::validation("Missing closing ']'"))
                    }
                }
                groups.push(members);
                pending_separator = false;
            }
            Token::Comma => {
                if groups.is_empty() || pending_separator {
                    return Err(LeagueError::validation("Empty participant between ','"));
                }
                pending_separator = true;
            }
            Token::Close => return Err(LeagueError::validation("Unexpected ']'"))
        }
    }

    if pending_separator {
        return Err(LeagueError::validation("Trailing ',' without a participant"));
    }

    if groups.is_empty() {
        return Err(LeagueError::validation("No participants given"));
    }

    Ok(groups)
}

fn parse_scores(clause: &str) -> LeagueResult<Vec<i64>> {
    clause
        .split(',')
        .map(|s| {
            let s = s.trim();
            s.parse::<i64>()
                .map_err(|_| LeagueError::validation(format!("Invalid score '{}'", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse, places_from_scores, resolve};
    use crate::{
        model::{error::LeagueError, structures::league_match::NewEntry},
        utils::test_utils::generate_state
    };

    fn groups(input: &str) -> Vec<Vec<String>> {
        parse(input).unwrap().groups
    }

    #[test]
    fn test_plain_names() {
        assert_eq!(groups("Alice, Bob"), vec![vec!["Alice"], vec!["Bob"]]);
        assert_eq!(groups("  Mary Jane ,Bob,Carol "), vec![vec!["Mary Jane"], vec!["Bob"], vec!["Carol"]]);
    }

    #[test]
    fn test_teams() {
        assert_eq!(
            groups("[Alice, Bob], [Carol, Dan]"),
            vec![vec!["Alice", "Bob"], vec!["Carol", "Dan"]]
        );
        // Adjacent teams need no comma
        assert_eq!(groups("[Alice,Bob] [Carol] Dan"), vec![vec!["Alice", "Bob"], vec!["Carol"], vec!["Dan"]]);
    }

    #[test]
    fn test_scores() {
        let parsed = parse("[Alice, Bob], Carol score:10, 7").unwrap();

        assert_eq!(parsed.groups.len(), 2);
        assert_eq!(parsed.scores, Some(vec![10, 7]));
        assert_eq!(parsed.places(), vec![1, 2]);
    }

    #[test]
    fn test_places_from_scores() {
        assert_eq!(places_from_scores(&[3, 3]), vec![1, 1]);
        assert_eq!(places_from_scores(&[1, 5, 3]), vec![3, 1, 2]);
        assert_eq!(places_from_scores(&[2, 9, 2, 0]), vec![2, 1, 2, 4]);
    }

    #[test]
    fn test_places_without_scores_follow_listing_order() {
        assert_eq!(parse("A, B, C").unwrap().places(), vec![1, 2, 3]);
    }

    #[test]
    fn test_malformed_input() {
        for input in [
            "",
            "Alice,",
            ",Alice",
            "Alice,,Bob",
            "[Alice, Bob",
            "[]",
            "[Alice,]",
            "[[Alice]]",
            "Alice]",
            "Alice, Bob score:1",
            "Alice, Bob score:1,x",
        ] {
            assert!(
                matches!(parse(input), Err(LeagueError::Validation(_))),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let state = generate_state(3);

        let entries = resolve("[player 1, PLAYER 2], Player 3 score:2,2", &state).unwrap();

        assert_eq!(
            entries,
            vec![
                NewEntry {
                    players: vec![1, 2],
                    place: 1,
                    score: Some(2)
                },
                NewEntry {
                    players: vec![3],
                    place: 1,
                    score: Some(2)
                },
            ]
        );
    }

    #[test]
    fn test_resolve_unknown_player() {
        let state = generate_state(1);

        let result = resolve("Player 1, Nobody", &state);

        assert_eq!(
            result,
            Err(LeagueError::Validation("Player 'Nobody' does not exist.".to_string()))
        );
    }
}
