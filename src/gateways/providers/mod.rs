pub mod cash_plus;
pub mod inwi_money;
pub mod orange_money;

pub use cash_plus::CashPlusGateway;
pub use inwi_money::InwiMoneyGateway;
pub use orange_money::OrangeMoneyGateway;
