mod bootstrap;
mod mock;
mod reconcile;
mod resolve;
