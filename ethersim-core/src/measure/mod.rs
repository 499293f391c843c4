/*!
measurement units of the simulated medium
*/

mod bandwidth;

pub use self::bandwidth::Bandwidth;
