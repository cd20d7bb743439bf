//! Tic-tac-toe.
//!
//! The board is a 3×3 grid of `bool | null` cells: `true` marks the
//! player at roster position 0, `false` the one at position 1. Cells are
//! addressed `board[x][y]`.

use parlor_engine::{
    GameError, GameRules, GameSetup, GameType, PlayerId, PlayerLimits, RulesView, TurnCtx,
};
use serde_json::{json, Map, Value};

type Board = Vec<Vec<Option<bool>>>;

pub struct TikTakToe;

impl TikTakToe {
    pub const NAMESPACE: &'static str = "tiktaktoe";

    pub fn game_type() -> GameType {
        GameType::new(Self::NAMESPACE, || Box::new(TikTakToe))
    }

    fn empty_board() -> Value {
        json!([[null, null, null], [null, null, null], [null, null, null]])
    }

    fn board(extra: &Map<String, Value>) -> Result<Board, GameError> {
        serde_json::from_value(extra.get("board").cloned().unwrap_or(Value::Null))
            .map_err(|e| GameError::InvalidAction(format!("board is corrupt: {e}")))
    }

    /// Maps a cell mark back to the roster: `true` is position 0.
    fn player_for_mark(view: &RulesView<'_>, mark: bool) -> Option<PlayerId> {
        view.player_at(if mark { 0 } else { 1 }).cloned()
    }
}

impl GameRules for TikTakToe {
    fn limits(&self) -> PlayerLimits {
        PlayerLimits::new(2, 2)
    }

    fn on_init(&mut self, setup: &mut GameSetup) -> Result<(), GameError> {
        let mut data = Map::new();
        data.insert("board".into(), Self::empty_board());
        setup.set_initial_game_data(data)?;
        setup.set_shuffle_before_start(true);
        Ok(())
    }

    fn check_win_condition(&self, view: &RulesView<'_>) -> Option<PlayerId> {
        let board = Self::board(view.extra()).ok()?;

        for i in 0..3 {
            if board[i][0].is_some() && board[i][0] == board[i][1] && board[i][1] == board[i][2] {
                return Self::player_for_mark(view, board[i][0]?);
            }
            if board[0][i].is_some() && board[0][i] == board[1][i] && board[1][i] == board[2][i] {
                return Self::player_for_mark(view, board[0][i]?);
            }
        }

        if board[0][0].is_some() && board[0][0] == board[1][1] && board[1][1] == board[2][2]
            || board[0][2].is_some() && board[0][2] == board[1][1] && board[1][1] == board[2][0]
        {
            return Self::player_for_mark(view, board[1][1]?);
        }

        None
    }

    fn on_player_action(
        &mut self,
        ctx: &mut TurnCtx<'_>,
        player: PlayerId,
        action: &Map<String, Value>,
    ) -> Result<bool, GameError> {
        let x = action.get("x").and_then(Value::as_u64).map(|v| v as usize);
        let y = action.get("y").and_then(Value::as_u64).map(|v| v as usize);
        let (Some(x), Some(y)) = (x, y) else {
            return Err(GameError::InvalidAction(
                "x and y must be non-negative numbers".into(),
            ));
        };
        if x >= 3 || y >= 3 {
            return Err(GameError::InvalidAction("cell is off the board".into()));
        }

        let mut board = Self::board(ctx.extra())?;
        if board[x][y].is_some() {
            return Err(GameError::InvalidAction("cell is already taken".into()));
        }

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
        &["x", "y"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_engine::{EngineCtx, EventBus, EventFilter, EventKind, GameId, GameSession, GameState};
    use std::collections::VecDeque;

    struct Table {
        session: GameSession,
        bus: EventBus,
        deferred: VecDeque<GameId>,
    }

    impl Table {
        /// A running two-player game; returns the roster in turn order.
        fn start() -> (Self, Vec<PlayerId>) {
            let mut t = Table {
                session: GameSession::new(Box::new(TikTakToe)),
                bus: EventBus::new(),
                deferred: VecDeque::new(),
            };
            let mut ctx = EngineCtx::new(&mut t.bus, &mut t.deferred);
            t.session
                .init(GameId::new(TikTakToe::NAMESPACE, 0), &mut ctx)
                .unwrap();
            t.session.join("ada", None, &mut ctx).unwrap();
            t.session.join("bob", None, &mut ctx).unwrap();
            t.session.start(&mut ctx).unwrap();
            let order = t.session.game_data().unwrap().player_ids;
            (t, order)
        }

        fn place(&mut self, player: &PlayerId, x: usize, y: usize) -> Result<(), GameError> {
            let mut action = Map::new();
            action.insert("x".into(), json!(x));
            action.insert("y".into(), json!(y));
            let mut ctx = EngineCtx::new(&mut self.bus, &mut self.deferred);
            self.session.handle_action(player, &action, &mut ctx)
        }

        fn board(&self) -> Board {
            TikTakToe::board(&self.session.game_data().unwrap().extra).unwrap()
        }
    }

    #[test]
    fn test_two_players_required() {
        let mut t = Table {
            session: GameSession::new(Box::new(TikTakToe)),
            bus: EventBus::new(),
            deferred: VecDeque::new(),
        };
        let mut ctx = EngineCtx::new(&mut t.bus, &mut t.deferred);
        t.session
            .init(GameId::new(TikTakToe::NAMESPACE, 0), &mut ctx)
            .unwrap();
        t.session.join("ada", None, &mut ctx).unwrap();
        assert!(matches!(
            t.session.start(&mut ctx),
            Err(GameError::NotEnoughPlayers { .. })
        ));
        t.session.join("bob", None, &mut ctx).unwrap();
        assert!(matches!(
            t.session.join("eve", None, &mut ctx),
            Err(GameError::RoomFull(2))
        ));
    }

    #[test]
    fn test_board_starts_empty() {
        let (t, _) = Table::start();
        let board = t.board();
        assert_eq!(board.len(), 3);
        assert!(board.iter().all(|col| col.iter().all(Option::is_none)));
    }

    #[test]
    fn test_moves_alternate_turns() {
        let (mut t, order) = Table::start();
        assert_eq!(t.session.current_player().unwrap().id(), &order[0]);
        t.place(&order[0], 0, 0).unwrap();
        assert_eq!(t.session.current_player().unwrap().id(), &order[1]);
    }

    #[test]
    fn test_diagonal_win_scenario() {
        // Alternating moves (0,0) (1,0) (1,1) (2,0) (2,2): the opening
        // player takes the main diagonal.
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);

        let (_, mut ended) = t.bus.subscribe(EventFilter::kind(EventKind::GameEnded));

        t.place(first, 0, 0).unwrap();
        t.place(second, 1, 0).unwrap();
        t.place(first, 1, 1).unwrap();
        t.place(second, 2, 0).unwrap();
        t.place(first, 2, 2).unwrap();

        assert_eq!(t.session.state(), GameState::Ended);
        let event = ended.try_recv().unwrap();
        let data = event.data.as_game().unwrap();
        assert_eq!(data.winner_id.as_ref(), Some(first));

        let board = t.board();
        assert_eq!(board[0][0], Some(true));
        assert_eq!(board[1][0], Some(false));
        assert_eq!(board[1][1], Some(true));
        assert_eq!(board[2][0], Some(false));
        assert_eq!(board[2][2], Some(true));
        let placed: usize = board
            .iter()
            .flatten()
            .filter(|cell| cell.is_some())
            .count();
        assert_eq!(placed, 5);
    }

    #[test]
    fn test_column_win() {
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);
        t.place(first, 0, 0).unwrap();
        t.place(second, 1, 0).unwrap();
        t.place(first, 0, 1).unwrap();
        t.place(second, 1, 1).unwrap();
        t.place(first, 0, 2).unwrap();
        assert_eq!(t.session.state(), GameState::Ended);
        assert_eq!(
            t.session.game_data().unwrap().winner_id.as_ref(),
            Some(first)
        );
    }

    #[test]
    fn test_second_player_can_win() {
        let (mut t, order) = Table::start();
        let (first, second) = (&order[0], &order[1]);
        t.place(first, 0, 0).unwrap();
        t.place(second, 1, 0).unwrap();
        t.place(first, 0, 1).unwrap();
        t.place(second, 1, 1).unwrap();
        t.place(first, 2, 2).unwrap();
        t.place(second, 1, 2).unwrap();
        assert_eq!(t.session.state(), GameState::Ended);
        assert_eq!(
            t.session.game_data().unwrap().winner_id.as_ref(),
            Some(second)
        );
    }

    #[test]
    fn test_occupied_cell_is_rejected() {
        let (mut t, order) = Table::start();
        t.place(&order[0], 0, 0).unwrap();
        assert!(matches!(
            t.place(&order[1], 0, 0),
            Err(GameError::InvalidAction(_))
        ));
        // The failed move does not consume the turn.
        assert_eq!(t.session.current_player().unwrap().id(), &order[1]);
    }

    #[test]
    fn test_out_of_bounds_move_is_rejected() {
        let (mut t, order) = Table::start();
        assert!(matches!(
            t.place(&order[0], 3, 0),
            Err(GameError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_action_missing_coordinates_is_rejected() {
        let (mut t, order) = Table::start();
        let mut action = Map::new();
        action.insert("x".into(), json!(0));
        let mut ctx = EngineCtx::new(&mut t.bus, &mut t.deferred);
        assert!(matches!(
            t.session.handle_action(&order[0], &action, &mut ctx),
            Err(GameError::InvalidAction(_))
        ));
    }
}
