use super::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDraft {
    pub score: Score,
    pub profit_bps: u32,
}

/// Input for creating an event. Without options, the configured score catalog is
/// offered at the default profit rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub home: String,
    pub away: String,
    /// Kick-off, in unix milliseconds.
    pub scheduled_at: u64,
    #[serde(default = "default_mode")]
    pub mode: BetMode,
    #[serde(default)]
    pub suggested_score: Option<Score>,
    #[serde(default)]
    pub options: Vec<OptionDraft>,
}

fn default_mode() -> BetMode {
    BetMode::Normal
}

fn check_name(side: &str, name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "{side} participant must be 1..={MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

impl<'a, S: State> Layer<'a, S> {
    pub(crate) async fn handle_create_event(
        &mut self,
        draft: EventDraft,
    ) -> Result<(Event, Vec<BettingOption>), Error> {
        let home = check_name("home", &draft.home)?;
        let away = check_name("away", &draft.away)?;
        if draft.mode == BetMode::Inverse && draft.suggested_score.is_none() {
            return Err(Error::Validation(
                "inverse events need a suggested score".to_string(),
            ));
        }

        let options = if draft.options.is_empty() {
            let profit_bps = self.config.default_profit_bps;
            self.config
                .score_catalog
                .iter()
                .map(|&score| OptionDraft { score, profit_bps })
                .collect()
        } else {
            draft.options
        };
        if options.is_empty() {
            return Err(Error::Validation("event has no betting options".to_string()));
        }
        let mut seen = BTreeSet::new();
        for option in &options {
            if !seen.insert(option.score) {
                return Err(Error::Validation(format!(
                    "score {} offered twice",
                    option.score
                )));
            }
            if option.profit_bps == 0 {
                return Err(Error::Validation(format!(
                    "option {} needs a positive profit rate",
                    option.score
                )));
            }
        }

        let id = self.next_id(Sequence::Event).await?;
        let event = Event {
            id,
            home,
            away,
            scheduled_at: draft.scheduled_at,
            status: EventStatus::Active,
            mode: draft.mode,
            suggested_score: draft.suggested_score,
            final_score: None,
            closing: None,
        };

        let mut created = Vec::with_capacity(options.len());
        for option in options {
            let option_id = self.next_id(Sequence::BettingOption).await?;
            let option = BettingOption {
                id: option_id,
                event_id: id,
                score: option.score,
                profit_bps: option.profit_bps,
            };
            self.insert(
                Key::BettingOption(option_id),
                Value::BettingOption(option.clone()),
            );
            created.push(option);
        }
        self.insert(
            Key::EventOptions(id),
            Value::Ids(created.iter().map(|option| option.id).collect()),
        );
        self.insert(Key::Event(id), Value::Event(event.clone()));
        Ok((event, created))
    }

    /// Loads every option of an event, in creation order.
    pub(crate) async fn event_options(
        &mut self,
        event_id: EventId,
    ) -> Result<Vec<BettingOption>, Error> {
        let ids = self.ids(Key::EventOptions(event_id)).await?;
        let mut options = Vec::with_capacity(ids.len());
        for id in ids {
            options.push(self.option(id).await?);
        }
        Ok(options)
    }
}
