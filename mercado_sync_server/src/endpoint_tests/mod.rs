mod helpers;
mod sync;
mod webhook;
