//! Connect four.
//!
//! The board is 7 columns of 6 cells, `board[x][y]` with `y` counting
//! up from the bottom. A move names a column; the piece falls to the
//! lowest free cell. Marks work as in tic-tac-toe: `true` is the player
//! at roster position 0. The roster is not shuffled; join order plays.

use parlor_engine::{
    GameError, GameRules, GameSetup, GameType, PlayerId, PlayerLimits, RulesView, TurnCtx,
};
use serde_json::{Map, Value};

const COLUMNS: usize = 7;
const ROWS: usize = 6;

type Board = Vec<Vec<Option<bool>>>;

pub struct ConnectFour;

impl ConnectFour {
    pub const NAMESPACE: &'static str = "connectfour";

    pub fn game_type() -> GameType {
        GameType::new(Self::NAMESPACE, || Box::new(ConnectFour))
    }

    fn empty_board() -> Value {
        serde_json::to_value(vec![vec![Option::<bool>::None; ROWS]; COLUMNS])
            .expect("plain data")
    }

    fn board(extra: &Map<String, Value>) -> Result<Board, GameError> {
        serde_json::from_value(extra.get("board").cloned().unwrap_or(Value::Null))
            .map_err(|e| GameError::InvalidAction(format!("board is corrupt: {e}")))
    }

    fn player_for_mark(view: &RulesView<'_>, mark: bool) -> Option<PlayerId> {
        view.player_at(if mark { 0 } else { 1 }).cloned()
    }

    fn free_row(board: &Board, x: usize) -> Option<usize> {
        board[x].iter().position(Option::is_none)
    }
}

impl GameRules for ConnectFour {
    fn limits(&self) -> PlayerLimits {
        PlayerLimits::new(2, 2)
    }

    fn on_init(&mut self, setup: &mut GameSetup) -> Result<(), GameError> {
        setup.set_shuffle_before_start(false);
        let mut data = Map::new();
        data.insert("board".into(), Self::empty_board());
        setup.set_initial_game_data(data)?;
        Ok(())
    }

    fn check_win_condition(&self, view: &RulesView<'_>) -> Option<PlayerId> {
        let board = Self::board(view.extra()).ok()?;

        for x in 0..COLUMNS {
            for y in 0..ROWS {
                let Some(mark) = board[x][y] else { continue };
                let cell = Some(mark);

                // Vertical
                if y + 3 < ROWS
                    && cell == board[x][y + 1]
                    && cell == board[x][y + 2]
                    && cell == board[x][y + 3]
                {
                    return Self::player_for_mark(view, mark);
                }
                // Horizontal
                if x + 3 < COLUMNS
                    && cell == board[x + 1][y]
                    && cell == board[x + 2][y]
                    && cell == board[x + 3][y]
                {
                    return Self::player_for_mark(view, mark);
                }
                // Diagonal upwards
                if x + 3 < COLUMNS
                    && y + 3 < ROWS
                    && cell == board[x + 1][y + 1]
                    && cell == board[x + 2][y + 2]
                    && cell == board[x + 3][y + 3]
                {
                    return Self::player_for_mark(view, mark);
                }
                // Diagonal downwards
                if x + 3 < COLUMNS
                    && y >= 3
                    && cell == board[x + 1][y - 1]
                    && cell == board[x + 2][y - 2]
                    && cell == board[x + 3][y - 3]
                {
                    return Self::player_for_mark(view, mark);
                }
            }
        }

        None
    }

    fn on_player_action(
        &mut self,
        ctx: &mut TurnCtx<'_>,
        player: PlayerId,
        action: &Map<String, Value>,
    ) -> Result<bool, GameError> {
        let x = action
            .get("x")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .ok_or_else(|| GameError::InvalidAction("x must be a non-negative number".into()))?;
        if x >= COLUMNS {
            return Err(GameError::InvalidAction("column is off the board".into()));
        }

        let mut board = Self::board(ctx.extra())?;
        let y = Self::free_row(&board, x)
            .ok_or_else(|| GameError::InvalidAction("column is full".into()))?;

        let first = ctx
            .player_at(0)
            .cloned()
            .ok_or_else(|| GameError::InvalidAction("no players".into()))?;
        board[x][y] = Some(player == first);

        let mut patch = Map::new();
        patch.insert("board".into(), serde_json::to_value(board).expect("plain data"));
        ctx.update_game_data_silent(patch)?;
        Ok(true)
    }

    fn action_fields(&self) -> &'static [&'static str] {
        &["x"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_engine::{EngineCtx, EventBus, GameId, GameSession, GameState};
    use serde_json::json;
    use std::collections::VecDeque;

    struct Table {
        session: GameSession,
        bus: EventBus,
        deferred: VecDeque<GameId>,
    }

    impl Table {
        fn start() -> (Self, Vec<PlayerId>) {
            let mut t = Table {
                session: GameSession::new(Box::new(ConnectFour)),
                bus: EventBus::new(),
                deferred: VecDeque::new(),
            };
            let mut ctx = EngineCtx::new(&mut t.bus, &mut t.deferred);
            t.session
                .init(GameId::new(ConnectFour::NAMESPACE, 0), &mut ctx)
                .unwrap();
            t.session.join("ada", None, &mut ctx).unwrap();
            t.session.join("bob", None, &mut ctx).unwrap();
            t.session.start(&mut ctx).unwrap();
            let order = t.session.game_data().unwrap().player_ids;
            (t, order)
        }

        fn drop_piece(&mut self, player: &PlayerId, x: usize) -> Result<(), GameError> {
            let mut action = Map::new();
            action.insert("x".into(), json!(x));
            let mut ctx = EngineCtx::new(&mut self.bus, &mut self.deferred);
            self.session.handle_action(player, &action, &mut ctx)
        }

        fn board(&self) -> Board {
            ConnectFour::board(&self.session.game_data().unwrap().extra).unwrap()
        }
    }

    #[test]
    fn test_roster_is_not_shuffled() {
        let (_, order) = Table::start();
        // Without shuffling, join order is play order and ordinals are
        // allocated in sequence.
        assert_eq!(order[0].ordinal, 0);
        assert_eq!(order[1].ordinal, 1);
    }

    #[test]
    fn test_pieces_stack_from_the_bottom() {
        let (mut t, order) = Table::start();
        t.drop_piece(&order[0], 3).unwrap();
        t.drop_piece(&order[1], 3).unwrap();
        let board = t.board();
        assert_eq!(board[3][0], Some(true));
        assert_eq!(board[3][1], Some(false));
        assert_eq!(board[3][2], None);
    }

    #[test]
    fn test_vertical_win() {
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);
        for _ in 0..3 {
            t.drop_piece(first, 0).unwrap();
            t.drop_piece(second, 1).unwrap();
        }
        t.drop_piece(first, 0).unwrap();
        assert_eq!(t.session.state(), GameState::Ended);
        assert_eq!(
            t.session.game_data().unwrap().winner_id.as_ref(),
            Some(first)
        );
    }

    #[test]
    fn test_horizontal_win() {
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);
        for x in 0..3 {
            t.drop_piece(first, x).unwrap();
            t.drop_piece(second, x).unwrap();
        }
        t.drop_piece(first, 3).unwrap();
        assert_eq!(t.session.state(), GameState::Ended);
        assert_eq!(
            t.session.game_data().unwrap().winner_id.as_ref(),
            Some(first)
        );
    }

    #[test]
    fn test_diagonal_win() {
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);
        // Build the staircase: first climbs columns 0-3.
        t.drop_piece(first, 0).unwrap();
        t.drop_piece(second, 1).unwrap();
        t.drop_piece(first, 1).unwrap();
        t.drop_piece(second, 2).unwrap();
        t.drop_piece(first, 2).unwrap();
        t.drop_piece(second, 3).unwrap();
        t.drop_piece(first, 2).unwrap();
        t.drop_piece(second, 3).unwrap();
        t.drop_piece(first, 3).unwrap();
        t.drop_piece(second, 6).unwrap();
        t.drop_piece(first, 3).unwrap();
        assert_eq!(t.session.state(), GameState::Ended);
        assert_eq!(
            t.session.game_data().unwrap().winner_id.as_ref(),
            Some(first)
        );
    }

    #[test]
    fn test_full_column_is_rejected() {
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);
        for _ in 0..3 {
            t.drop_piece(first, 0).unwrap();
            t.drop_piece(second, 0).unwrap();
        }
        assert!(matches!(
            t.drop_piece(first, 0),
            Err(GameError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_out_of_range_column_is_rejected() {
        let (mut t, order) = Table::start();
        assert!(matches!(
            t.drop_piece(&order[0], 7),
            Err(GameError::InvalidAction(_))
        ));
    }
}
