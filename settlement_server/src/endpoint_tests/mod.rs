mod helpers;
mod orders;
mod settlement;
mod webhook;
